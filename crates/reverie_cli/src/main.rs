use clap::Parser;
use reverie_core::config::ReverieConfig;
use reverie_core::persona::{render_template, DialogueScript, PersonaCatalog};
use reverie_core::state::{ConversationState, IntroStage, Transcript, TranscriptTurn};
use reverie_dialogue::providers::{MockGenerator, OllamaGenerator};
use reverie_dialogue::{Generator, NarrativeOrchestrator};
use reverie_memory::sqlite::SqliteStore;
use reverie_memory::store::NarrativeStore;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "reverie.toml")]
    config: String,

    /// Path to the state database (overrides config)
    #[arg(short, long)]
    db: Option<String>,

    /// Persona to converse with (overrides config)
    #[arg(short, long)]
    persona: Option<String>,

    /// Extra persona directory to load on top of the built-in seeds
    #[arg(long)]
    persona_dir: Option<String>,

    /// User id the state is keyed under
    #[arg(short, long, default_value = "local")]
    user: String,

    /// Model to use (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Run against the canned mock generator instead of a live model
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    let args = Args::parse();

    let mut config = ReverieConfig::load_or_default(&args.config);
    if let Some(db) = args.db {
        config.store.db_path = db;
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }
    if let Some(persona) = args.persona {
        config.narrative.default_persona = persona;
    }
    let agent_id = config.narrative.default_persona.clone();

    // 1. Load personas
    let mut catalog = PersonaCatalog::builtin()?;
    let persona_dir = args.persona_dir.or(config.narrative.persona_dir.clone());
    if let Some(dir) = persona_dir {
        let loaded = catalog.load_dir(&dir).await?;
        info!("Loaded {} persona(s) from {}", loaded, dir);
    }
    let persona = catalog.get(&agent_id)?.clone();

    // 2. Connect state store
    info!("Opening state store at {}...", config.store.db_path);
    let store = Arc::new(SqliteStore::new(&config.store.db_path).await?);

    // 3. Pick a generator
    let generator: Arc<dyn Generator> = if args.mock || config.llm.provider == "mock" {
        info!("Using mock generator");
        Arc::new(MockGenerator::new(
            "That sounds like quite a moment. What else do you remember about it?",
        ))
    } else {
        info!("Using Ollama with model {}", config.llm.model);
        Arc::new(OllamaGenerator::new(
            &config.llm.model,
            config.llm.base_url.as_deref(),
        )?)
    };

    let orchestrator = NarrativeOrchestrator::new(catalog, store.clone(), generator);

    // Open the session: if the introduction hasn't run for this pair yet,
    // the persona speaks first.
    let narrative = store
        .load_narrative_state(&args.user, &agent_id)
        .await?
        .unwrap_or_default();
    let mut transcript = Transcript::new();
    let mut session: Option<ConversationState> = None;

    println!("Reverie — talking with {}. Type 'quit' to exit.", persona.name);
    if !narrative.has_completed_introduction && narrative.intro_stage == IntroStage::InitialGreeting
    {
        let script = persona.stage_message(IntroStage::InitialGreeting)?;
        let opening = render_template(&script.message, &narrative.display_name());
        println!("\n{}: {}\n", persona.name, opening);
        transcript.push(TranscriptTurn::agent(&opening));
    }

    print!("> ");
    io::stdout().flush()?;

    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        if trimmed.is_empty() {
            print!("> ");
            io::stdout().flush()?;
            continue;
        }

        match orchestrator
            .process_turn(&args.user, &agent_id, trimmed, &transcript, session.take())
            .await
        {
            Ok(outcome) => {
                println!("\n{}: {}\n", persona.name, outcome.response);
                transcript.push(TranscriptTurn::user(trimmed));
                transcript.push(TranscriptTurn::agent(&outcome.response));
                session = Some(outcome.conversation);
                if outcome.metadata.conversation_ended {
                    // The scripted opening wrapped up; the next message
                    // starts a fresh casual session.
                    println!("(conversation closed — say anything to keep chatting)\n");
                    transcript = Transcript::new();
                    session = None;
                }
            }
            Err(e) => {
                error!("Turn failed: {}", e);
                println!("\n[System Error]: {}\n", e);
            }
        }

        print!("> ");
        io::stdout().flush()?;
    }

    Ok(())
}
