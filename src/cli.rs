// Command surface: flag parsing with clap, interactive credential prompts
// with dialoguer and terminal rendering. Everything here is presentation;
// the decisions live in `client`.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{CommandFactory, Parser};
use colored::Colorize;
use dialoguer::{Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};

use crate::client::Manai;
use crate::error::ApiError;
use crate::gateway::Backend;
use crate::types::Capability;

/// Production deployment; override with `--url` or `MANAI_API_URL`.
pub const DEFAULT_URL: &str = "https://manai-agent-function-app.azurewebsites.net/api";

pub const LANGUAGES: [&str; 10] = ["pt", "en", "es", "fr", "de", "it", "ja", "zh", "ru", "ar"];

#[derive(Parser, Debug)]
#[command(
    name = "manai",
    version,
    about = "Your AI assistant for Linux commands",
    after_help = "Examples:\n  \
        manai 'how do I list hidden files?'\n  \
        manai --new-session 'how does find work?'\n  \
        manai --register\n  \
        manai --login\n  \
        manai --status\n  \
        manai --test-connection"
)]
pub struct Cli {
    /// Your question about Linux commands, in natural language
    pub query: Vec<String>,

    /// Start a new conversation, ignoring any stored context
    #[arg(long)]
    pub new_session: bool,

    /// Answer language
    #[arg(short, long, default_value = "pt", value_parser = LANGUAGES)]
    pub language: String,

    /// Create a new account
    #[arg(long)]
    pub register: bool,

    /// Log in to an existing account
    #[arg(long)]
    pub login: bool,

    /// Log out and clear local state
    #[arg(long)]
    pub logout: bool,

    /// Show account, tier and usage information
    #[arg(long)]
    pub status: bool,

    /// Show usage statistics
    #[arg(long)]
    pub stats: bool,

    /// Check access to a specific feature
    #[arg(long, value_name = "NAME")]
    pub check_feature: Option<String>,

    /// Check that the remote service is reachable
    #[arg(long)]
    pub test_connection: bool,

    /// Base URL of the agent service
    #[arg(long, env = "MANAI_API_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Service access key (a deployment secret, so there is no default)
    #[arg(long, env = "MANAI_ACCESS_KEY")]
    pub key: Option<String>,
}

/// Dispatch one invocation. Only an unresolved failure on the ask path
/// maps to a non-zero exit code; everything else is informational.
pub fn run<B: Backend>(args: &Cli, client: &Manai<B>) -> Result<ExitCode> {
    if args.test_connection {
        return cmd_test_connection(client);
    }
    if args.register {
        return cmd_register(client, &args.language);
    }
    if args.login {
        return cmd_login(client);
    }
    if args.logout {
        client.logout();
        println!("{} logged out", "✓".green());
        return Ok(ExitCode::SUCCESS);
    }
    if args.status {
        return cmd_status(client);
    }
    if args.stats {
        return cmd_stats(client);
    }
    if let Some(feature) = &args.check_feature {
        return cmd_check_feature(client, feature);
    }
    if !args.query.is_empty() {
        let question = args.query.join(" ");
        return cmd_ask(client, &question, &args.language, args.new_session);
    }

    println!("{}", "manai: your AI assistant for Linux commands".bold());
    println!();
    Cli::command().print_help()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_ask<B: Backend>(
    client: &Manai<B>,
    question: &str,
    language: &str,
    new_session: bool,
) -> Result<ExitCode> {
    if !client.is_authenticated() {
        report(&ApiError::Unauthenticated);
        return Ok(ExitCode::FAILURE);
    }

    // Pre-flight quota check; deployments without the endpoint (or a
    // failing check) never block the question itself.
    match client.check_usage_limits(language) {
        Ok(Capability::Available(limit)) if !limit.can_make_query => {
            println!("{} daily query limit reached", "✗".red());
            println!("  usage: {}/{}", limit.current_usage, limit.daily_limit);
            println!("  upgrade your plan for unlimited queries");
            return Ok(ExitCode::FAILURE);
        }
        Ok(_) => {}
        Err(err) => log::debug!("usage pre-check failed: {err}"),
    }

    let spinner = spinner("Thinking...");
    let result = client.ask_question(question, language, !new_session);
    spinner.finish_and_clear();

    match result {
        Ok(answer) => {
            println!("{}", answer.text);
            if let Some(usage) = &answer.usage {
                if usage.daily_limit > 0 {
                    let line = format!(
                        "usage: {}/{}",
                        usage.queries_used_today, usage.daily_limit
                    );
                    println!("\n{}", line.dimmed());
                    if usage.queries_used_today * 10 >= usage.daily_limit * 8 {
                        println!("{}", "close to the daily limit; consider upgrading".yellow());
                    }
                } else {
                    println!("\n{}", format!("queries today: {}", usage.queries_used_today).dimmed());
                }
            }
            if let (Some(id), false) = (&answer.thread_id, new_session) {
                println!(
                    "{}",
                    format!(
                        "session ...{} (use --new-session to start over)",
                        id_suffix(id)
                    )
                    .dimmed()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report(&err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_register<B: Backend>(client: &Manai<B>, default_language: &str) -> Result<ExitCode> {
    println!("{}", "Create a new account".bold());

    let email: String = Input::new().with_prompt("Email").interact_text()?;
    if email.trim().is_empty() {
        println!("{} email is required", "✗".red());
        return Ok(ExitCode::SUCCESS);
    }
    let password: String = Password::new().with_prompt("Password").interact()?;
    // the server validates too; this just saves a round trip
    if password.len() < 8 {
        println!("{} password must be at least 8 characters", "✗".red());
        return Ok(ExitCode::SUCCESS);
    }
    let first_name: String = Input::new().with_prompt("First name").interact_text()?;
    let last_name: String = Input::new().with_prompt("Last name").interact_text()?;
    let default_index = LANGUAGES
        .iter()
        .position(|l| *l == default_language)
        .unwrap_or(0);
    let language =
        LANGUAGES[Select::new()
            .with_prompt("Preferred language")
            .items(&LANGUAGES)
            .default(default_index)
            .interact()?];

    let spinner = spinner("Registering...");
    let result = client.register(email.trim(), &password, first_name.trim(), last_name.trim(), language);
    spinner.finish_and_clear();

    match result {
        Ok(account) => {
            println!("{} registered successfully", "✓".green());
            println!("  tier: {}", account.user.tier_type.to_uppercase());
        }
        Err(err) if err.is_unsupported() => {
            println!("registration is not available on this deployment");
            println!("contact the administrator to have an account created");
        }
        Err(err) => report(&err),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_login<B: Backend>(client: &Manai<B>) -> Result<ExitCode> {
    println!("{}", "Log in".bold());

    let email: String = Input::new().with_prompt("Email").interact_text()?;
    if email.trim().is_empty() {
        println!("{} email is required", "✗".red());
        return Ok(ExitCode::SUCCESS);
    }
    let password: String = Password::new().with_prompt("Password").interact()?;

    let spinner = spinner("Logging in...");
    let result = client.login(email.trim(), &password);
    spinner.finish_and_clear();

    match result {
        Ok(account) => {
            println!("{} welcome, {}!", "✓".green(), account.user.first_name);
            println!("  tier: {}", account.user.tier_type.to_uppercase());
        }
        Err(err) => report(&err),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_status<B: Backend>(client: &Manai<B>) -> Result<ExitCode> {
    if !client.is_authenticated() {
        report(&ApiError::Unauthenticated);
        return Ok(ExitCode::SUCCESS);
    }

    let profile = match client.get_profile() {
        Ok(profile) => profile,
        Err(err) => {
            report(&err);
            return Ok(ExitCode::SUCCESS);
        }
    };

    let stored_email = client.account().map(|a| a.user.email).unwrap_or_default();

    let Capability::Available(profile) = profile else {
        // original deployment, no freemium system
        println!("running against the original deployment (no tier system)");
        println!("  user:    {stored_email}");
        println!("  tier:    ORIGINAL");
        println!("  queries: unlimited");
        return Ok(ExitCode::SUCCESS);
    };

    let tier = match client.get_tier_config() {
        Ok(Capability::Available(tier)) => tier,
        Ok(Capability::Unsupported) => {
            println!("tier configuration is not available on this deployment");
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => {
            report(&err);
            return Ok(ExitCode::SUCCESS);
        }
    };

    let email = if profile.email.is_empty() { stored_email } else { profile.email };
    println!("  user: {email}");
    println!("  tier: {}", tier.tier_type.to_uppercase());

    if tier.daily_query_limit > 0 {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let used_today = match client.get_usage_stats() {
            Ok(Capability::Available(stats)) => stats
                .daily_statistics
                .iter()
                .find(|s| s.date.starts_with(&today))
                .map(|s| s.queries_count)
                .unwrap_or(0),
            _ => 0,
        };
        println!("  usage today: {used_today}/{}", tier.daily_query_limit);
    } else {
        println!("  queries: unlimited");
    }

    if !tier.supported_languages.is_empty() {
        println!("  languages: {}", tier.supported_languages.join(", "));
    }
    println!("  features:");
    for (name, enabled) in [
        ("long-term memory", tier.features.long_term_memory),
        ("custom commands", tier.features.custom_commands),
        ("IDE integration", tier.features.ide_integration),
        ("analytics", tier.features.analytics),
    ] {
        let mark = if enabled { "✓".green() } else { "✗".red() };
        println!("    {mark} {name}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_stats<B: Backend>(client: &Manai<B>) -> Result<ExitCode> {
    if !client.is_authenticated() {
        report(&ApiError::Unauthenticated);
        return Ok(ExitCode::SUCCESS);
    }

    match client.get_usage_stats() {
        Ok(Capability::Available(stats)) => {
            println!("{}", "Usage statistics".bold());
            println!("  total queries: {}", stats.total_queries);
            println!("  per day:       {:.1}", stats.average_queries_per_day);
            println!("  tier:          {}", stats.current_tier.to_uppercase());
            if !stats.daily_statistics.is_empty() {
                println!("  last days:");
                for stat in stats.daily_statistics.iter().take(7) {
                    println!("    {}: {} queries", short_date(&stat.date), stat.queries_count);
                }
            }
        }
        Ok(Capability::Unsupported) => {
            println!("usage statistics are not available on this deployment");
        }
        Err(err) => report(&err),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_check_feature<B: Backend>(client: &Manai<B>, feature: &str) -> Result<ExitCode> {
    if !client.is_authenticated() {
        report(&ApiError::Unauthenticated);
        return Ok(ExitCode::SUCCESS);
    }

    match client.check_feature_access(feature) {
        Ok(Capability::Available(access)) => {
            let name = if access.feature_name.is_empty() {
                feature
            } else {
                &access.feature_name
            };
            if access.has_access {
                println!("feature '{name}': {}", "available".green());
            } else {
                println!(
                    "feature '{name}': requires tier {}",
                    access.required_tier.to_uppercase()
                );
            }
        }
        Ok(Capability::Unsupported) => {
            println!("feature checks are not available on this deployment");
        }
        Err(err) => report(&err),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_test_connection<B: Backend>(client: &Manai<B>) -> Result<ExitCode> {
    println!("checking connection...");
    match client.test_connection() {
        Ok(()) => println!("{} service is reachable", "✓".green()),
        Err(err) => report(&err),
    }
    Ok(ExitCode::SUCCESS)
}

/// Classified error plus its remediation hint, on stderr.
fn report(err: &ApiError) {
    eprintln!("{} {err}", "✗".red());
    if let Some(hint) = err.hint() {
        eprintln!("  {}", hint.dimmed());
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(message);
    spinner
}

/// Last eight characters of an opaque id. Ids are not guaranteed to be
/// ASCII, so this walks char boundaries instead of slicing bytes.
fn id_suffix(id: &str) -> &str {
    id.char_indices()
        .nth_back(7)
        .map(|(i, _)| &id[i..])
        .unwrap_or(id)
}

/// `dd/mm` from an ISO date(-time) string, falling back to the raw value.
fn short_date(iso: &str) -> String {
    iso.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .map(|d| d.format("%d/%m").to_string())
        .unwrap_or_else(|| iso.to_string())
}
