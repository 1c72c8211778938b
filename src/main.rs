//! celx - terminal hypermedia client
//!
//! Entry point for the command line client.

use celx::markup::{compile_page, ComponentRegistry, MarkupParser};
use celx::renderer::WidgetTree;
use celx::{Browser, BrowserConfig, NAME, VERSION};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "celx")]
#[command(about = "Terminal hypermedia client", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an application and drive it from stdin
    Run {
        /// Application endpoint
        endpoint: String,

        /// Title shown at the root route and for untitled pages
        #[arg(long)]
        title: Option<String>,

        /// Request timeout (seconds)
        #[arg(long, default_value = "30")]
        timeout_secs: u64,

        /// Keep going after runtime errors instead of halting
        #[arg(long)]
        keep_going: bool,
    },

    /// Compile a local document and print its widget outline
    Check {
        /// Markup file
        file: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            endpoint,
            title,
            timeout_secs,
            keep_going,
        } => {
            let mut config = BrowserConfig::new(endpoint).with_timeout(Duration::from_secs(timeout_secs));
            if let Some(title) = title {
                config = config.with_title(title);
            }
            config.fail_fast = !keep_going;
            run(config)
        }
        Commands::Check { file } => check(&file),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(config: BrowserConfig) -> celx::Result<()> {
    println!("{} v{}", NAME, VERSION);

    let mut browser = Browser::connect(config)?;
    browser.route("/", false)?;
    browser.run_until_idle();
    show(&browser)?;

    let stdin = io::stdin();
    prompt()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();

        let outcome = match (words.next(), words.next(), words.next()) {
            (None, _, _) => Ok(()),
            (Some("quit"), _, _) => break,
            (Some("show"), _, _) => show(&browser),
            (Some("back"), _, _) => browser.back(),
            (Some("forward"), _, _) => browser.forward(),
            (Some("refresh"), _, _) => browser.refresh(),
            (Some("go"), Some(destination), _) => browser.route(destination, false),
            (Some("fire"), Some(selector), event) => fire(&mut browser, selector, event.unwrap_or("on_submit")),
            (Some(other), _, _) => {
                println!("unknown command '{}' (go, fire, back, forward, refresh, show, quit)", other);
                Ok(())
            }
        };

        match outcome {
            Ok(()) => {
                browser.run_until_idle();
                for err in browser.take_errors() {
                    eprintln!("{}", err);
                }
            }
            Err(err) => eprintln!("{}", err),
        }
        prompt()?;
    }

    Ok(())
}

fn fire(browser: &mut Browser, selector: &str, event: &str) -> celx::Result<()> {
    match browser.find(selector)? {
        Some(widget) => {
            if !browser.dispatch(widget, event)? {
                println!("{} on {} was not handled", event, selector);
            }
            Ok(())
        }
        None => {
            println!("nothing matched {}", selector);
            Ok(())
        }
    }
}

fn show(browser: &Browser) -> celx::Result<()> {
    println!("== {} ==", browser.title());
    print!("{}", browser.outline()?);
    for alert in browser.alerts() {
        println!("! {}", alert);
    }
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

fn check(file: &str) -> celx::Result<()> {
    let source = std::fs::read_to_string(file)?;
    let document = MarkupParser::parse(&source)?;

    let mut registry = ComponentRegistry::new();
    let mut tree = WidgetTree::new();
    let page = compile_page(&document, &mut registry, &mut tree)?;

    if let Some(title) = &page.title {
        println!("== {} ==", title);
    }
    match &page.content {
        Some(content) => print!("{}", tree.outline(content.root)?),
        None => println!("(no content)"),
    }
    println!(
        "{} components, {} rules, {} page scripts",
        registry.len(),
        page.rules.len(),
        page.scripts.len()
    );
    Ok(())
}
