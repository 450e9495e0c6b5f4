//! Interactive console consultation: type symptom descriptions, answer the
//! doctor's follow-up questions, and receive the assessment report once enough
//! information has been gathered.

use consult_flow::InMemorySessionStorage;
use consultation_service::ConsultationManager;
use consultation_service::agents::generator_from_env;
use consultation_service::agents::types::MAX_EXCHANGES;
use std::io::{BufRead, Write};
use std::sync::Arc;
use uuid::Uuid;

const EXIT_WORDS: &[&str] = &["exit", "quit", "bye", "goodbye", "stop"];

const BANNER: &str = "=========================================================\n\
                      MEDICAL CONSULTATION ASSISTANT\n\
                      =========================================================";

const DISCLAIMER_BANNER: &str = "\
---------------------------------------------------------
This AI assessment is for INFORMATIONAL PURPOSES ONLY.
It is NOT a substitute for professional medical diagnosis
or treatment. Please consult a qualified healthcare
provider, and seek emergency care for severe symptoms.
---------------------------------------------------------";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let generator = generator_from_env();
    if generator.is_none() {
        eprintln!("(no OPENROUTER_API_KEY set - using built-in question and report templates)\n");
    }

    let manager = ConsultationManager::new(generator, Arc::new(InMemorySessionStorage::new()));
    let session_id = Uuid::new_v4().to_string();

    println!("{BANNER}");
    println!("\nDoctor: {}\n", manager.start_conversation().content);

    let stdin = std::io::stdin();
    let mut turns = 0usize;

    while turns < MAX_EXCHANGES {
        print!("Patient: ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                // EOF
                println!("\nDoctor: Thank you for visiting. Take care!");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("failed to read input: {e}");
                return;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            println!("\nDoctor: I'm here to listen. Please describe what's bothering you.\n");
            continue;
        }

        if EXIT_WORDS.contains(&input.to_lowercase().as_str()) {
            println!("\nDoctor: Take care of yourself! Seek professional medical attention if needed.");
            return;
        }

        turns += 1;

        match manager.process_message(&session_id, input, None).await {
            Ok(reply) if reply.completed => {
                println!("\nDoctor: Thank you for all that information. Here is your assessment.\n");
                println!("{}", reply.content);
                println!("\n{DISCLAIMER_BANNER}");
                println!("\nDoctor: I hope you feel better soon. Take care!");
                return;
            }
            Ok(reply) => {
                println!("\nDoctor: {}\n", reply.content);
            }
            Err(e) => {
                eprintln!("\nI encountered an error processing your message: {e}\n");
            }
        }
    }

    println!("\nDoctor: We've covered a lot today. Please take what we discussed to a healthcare provider. Take care!");
}
