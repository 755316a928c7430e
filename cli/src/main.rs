use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use scholarpath::api::types::{
    CareerForecastRequest, InstitutionSearchRequest, NewApplication, ProbabilityRequest, RagQueryRequest,
    ScholarshipSearchRequest,
};
use scholarpath::api::ApiError;
use scholarpath::app::CallbackNavigation;
use scholarpath::auth::{AuthError, Credentials, FileStorage, OAuthProvider, SignUpOptions, SignUpOutcome, UserMirror};
use scholarpath::config::ConfigError;
use scholarpath::dashboard::{DEFAULT_DEADLINE_DAYS, load_dashboard};
use scholarpath::profile::{ProfileUpdate, missing_fields};
use scholarpath::{App, AppConfig};
use serde::Serialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("not signed in; run `scholarpath login` first")]
    NotSignedIn,
    #[error("{0}")]
    Callback(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "scholarpath", about = "ScholarPath college and scholarship matching client")]
struct Cli {
    /// Backend API base URL (overrides SCHOLARPATH_API_URL from the environment file).
    #[arg(long, env = "SCHOLARPATH_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "SCHOLARPATH_SESSION_FILE", default_value = ".scholarpath/session.json")]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Session, route state and profile completeness.
    Status,
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SCHOLARPATH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SCHOLARPATH_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    Logout,
    /// Print the authorize URL for an OAuth provider (google, github, azure, apple).
    Oauth {
        provider: String,
    },
    /// Complete sign-in from the URL the provider redirected to.
    Callback {
        url: String,
    },
    ResetPassword {
        email: String,
    },
    MagicLink {
        email: String,
    },
    VerifyOtp {
        email: String,
        token: String,
    },
    /// Where navigating to `path` would lead right now.
    Route {
        path: String,
    },
    Profile(ProfileCommand),
    Dashboard {
        #[arg(long, default_value_t = DEFAULT_DEADLINE_DAYS)]
        days: u32,
    },
    Colleges(CollegesCommand),
    Probability {
        institution_id: String,
    },
    /// Ask the college-advice assistant a question.
    Ask {
        question: String,
    },
    Scholarships(ScholarshipsCommand),
    Deadlines {
        #[arg(long, default_value_t = DEFAULT_DEADLINE_DAYS)]
        days: u32,
    },
    Forecast {
        career: String,
        #[arg(long)]
        years: Option<u32>,
    },
    Applications(ApplicationsCommand),
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Show,
    Update(ProfileUpdateArgs),
}

#[derive(Args, Debug, Default)]
struct ProfileUpdateArgs {
    #[arg(long)]
    full_name: Option<String>,
    #[arg(long)]
    gpa: Option<f64>,
    #[arg(long)]
    sat_score: Option<u32>,
    #[arg(long)]
    act_score: Option<u32>,
    #[arg(long)]
    grade_level: Option<String>,
    #[arg(long)]
    intended_major: Option<String>,
    #[arg(long)]
    career_goals: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    family_income: Option<f64>,
    #[arg(long)]
    first_generation: Option<bool>,
    /// Repeat for each activity.
    #[arg(long = "extracurricular")]
    extracurriculars: Vec<String>,
}

impl ProfileUpdateArgs {
    fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            full_name: self.full_name,
            gpa: self.gpa,
            sat_score: self.sat_score,
            act_score: self.act_score,
            grade_level: self.grade_level,
            intended_major: self.intended_major,
            career_goals: self.career_goals,
            location: self.location,
            state: self.state,
            family_income: self.family_income,
            first_generation: self.first_generation,
            extracurriculars: (!self.extracurriculars.is_empty()).then_some(self.extracurriculars),
        }
    }
}

#[derive(Args, Debug)]
struct CollegesCommand {
    #[command(subcommand)]
    command: CollegesSubcommand,
}

#[derive(Subcommand, Debug)]
enum CollegesSubcommand {
    Search {
        query: String,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        max_tuition: Option<f64>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Show {
        id: String,
    },
}

#[derive(Args, Debug)]
struct ScholarshipsCommand {
    #[command(subcommand)]
    command: ScholarshipsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ScholarshipsSubcommand {
    Search {
        query: Option<String>,
        #[arg(long)]
        min_amount: Option<f64>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Args, Debug)]
struct ApplicationsCommand {
    #[command(subcommand)]
    command: ApplicationsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApplicationsSubcommand {
    List,
    Create {
        institution_id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = AppConfig::from_env()?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url.trim_end_matches('/').to_owned();
    }
    tracing::debug!(
        api_url = %config.api_url,
        identity = config.identity.is_some(),
        session_file = %cli.session_file.display(),
        "resolved configuration"
    );
    let storage = Arc::new(FileStorage::new(cli.session_file));
    let app = App::bootstrap_with_storage(config, storage).await?;

    let result = dispatch(&app, cli.command).await;
    app.shutdown();
    result
}

async fn dispatch(app: &App, command: Command) -> Result<(), CliError> {
    match command {
        Command::Status => print_json(&status(app)),
        Command::Login { email, password } => {
            app.session_store()
                .sign_in(&Credentials::new(&email, &password))
                .await?;
            app.refresh_profile().await;
            print_json(&status(app))
        }
        Command::Signup { email, password, name } => {
            let options = SignUpOptions { full_name: name };
            match app
                .session_store()
                .sign_up(&Credentials::new(&email, &password), &options)
                .await?
            {
                SignUpOutcome::Session(_) => {
                    app.refresh_profile().await;
                    print_json(&status(app))
                }
                SignUpOutcome::ConfirmationRequired { email } => print_json(&json!({
                    "confirmationRequired": true,
                    "email": email,
                })),
            }
        }
        Command::Logout => {
            let provider_error = app.session_store().sign_out().await.err();
            print_json(&json!({
                "signedOut": true,
                "providerError": provider_error.map(|e| e.to_string()),
            }))
        }
        Command::Oauth { provider } => {
            let provider: OAuthProvider = provider.parse()?;
            let url = app.session_store().sign_in_with_oauth(provider)?;
            print_json(&json!({ "provider": provider.as_str(), "url": url }))
        }
        Command::Callback { url } => match app.handle_callback(&url).await {
            CallbackNavigation::Go(decision) => print_json(&json!({
                "user": app.session_store().user_mirror(),
                "routeState": app.route_state(),
                "next": decision,
            })),
            CallbackNavigation::ShowError { message, retry } => {
                Err(CliError::Callback(format!("{message} (retry at {retry})")))
            }
        },
        Command::ResetPassword { email } => {
            app.session_store().reset_password(&email).await?;
            print_json(&json!({ "sent": true, "email": email.trim() }))
        }
        Command::MagicLink { email } => {
            app.session_store().sign_in_with_otp(&email).await?;
            print_json(&json!({ "sent": true, "email": email.trim() }))
        }
        Command::VerifyOtp { email, token } => {
            app.session_store().verify_otp(&email, &token).await?;
            app.refresh_profile().await;
            print_json(&status(app))
        }
        Command::Route { path } => print_json(&json!({
            "routeState": app.route_state(),
            "decision": app.navigate(&path),
        })),
        Command::Profile(profile) => run_profile(app, profile).await,
        Command::Dashboard { days } => {
            let user_id = require_user(app)?;
            print_json(&load_dashboard(app.api(), user_id, days).await)
        }
        Command::Colleges(colleges) => run_colleges(app, colleges).await,
        Command::Probability { institution_id } => {
            let user_id = require_user(app)?;
            let result = app
                .api()
                .calculate_probability(&ProbabilityRequest { user_id, institution_id })
                .await?;
            print_json(&result)
        }
        Command::Ask { question } => {
            let request = RagQueryRequest { query: question, user_id: app.session().map(|s| s.user_id()) };
            print_json(&app.api().rag_query(&request).await)
        }
        Command::Scholarships(scholarships) => run_scholarships(app, scholarships).await,
        Command::Deadlines { days } => print_json(&app.api().scholarship_deadlines(days).await),
        Command::Forecast { career, years } => {
            let request = CareerForecastRequest { career, user_id: app.session().map(|s| s.user_id()), years };
            print_json(&app.api().career_forecast(&request).await)
        }
        Command::Applications(applications) => run_applications(app, applications).await,
    }
}

async fn run_profile(app: &App, profile: ProfileCommand) -> Result<(), CliError> {
    match profile.command {
        ProfileSubcommand::Show => {
            require_user(app)?;
            let state = app.refresh_profile().await;
            print_json(&state)
        }
        ProfileSubcommand::Update(args) => {
            let updated = app.update_profile(&args.into_update()).await?;
            print_json(&json!({
                "profile": updated,
                "complete": app.profile_state().complete,
                "missing": missing_fields(&updated),
                "routeState": app.route_state(),
            }))
        }
    }
}

async fn run_colleges(app: &App, colleges: CollegesCommand) -> Result<(), CliError> {
    match colleges.command {
        CollegesSubcommand::Search { query, state, max_tuition, limit } => {
            let request = InstitutionSearchRequest {
                query: Some(query),
                state,
                max_tuition,
                limit: Some(limit),
                ..InstitutionSearchRequest::default()
            };
            print_json(&app.api().search_institutions(&request).await)
        }
        CollegesSubcommand::Show { id } => print_json(&app.api().get_institution(&id).await?),
    }
}

async fn run_scholarships(app: &App, scholarships: ScholarshipsCommand) -> Result<(), CliError> {
    match scholarships.command {
        ScholarshipsSubcommand::Search { query, min_amount, limit } => {
            let request = ScholarshipSearchRequest {
                user_id: app.session().map(|s| s.user_id()),
                query,
                min_amount,
                limit: Some(limit),
            };
            print_json(&app.api().search_scholarships(&request).await)
        }
    }
}

async fn run_applications(app: &App, applications: ApplicationsCommand) -> Result<(), CliError> {
    let user_id = require_user(app)?;
    match applications.command {
        ApplicationsSubcommand::List => print_json(&app.api().list_applications(user_id).await?),
        ApplicationsSubcommand::Create { institution_id, status, notes } => {
            let application = NewApplication { user_id, institution_id, status, notes };
            print_json(&app.api().create_application(&application).await?)
        }
    }
}

fn status(app: &App) -> Value {
    let store = app.session_store();
    let profile = app.profile_state();
    json!({
        "authEnabled": store.is_enabled(),
        "user": store.user_mirror().or_else(|| app.session().map(|s| UserMirror::from_user(&s.user))),
        "routeState": app.route_state(),
        "profile": {
            "complete": profile.complete,
            "missing": profile.profile.as_ref().map(missing_fields),
            "error": profile.error,
        },
    })
}

fn require_user(app: &App) -> Result<Uuid, CliError> {
    app.session()
        .map(|s| s.user_id())
        .ok_or(CliError::NotSignedIn)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
