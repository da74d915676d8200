use std::{process, sync::Arc};

use quire::{
    application::{
        auth::AuthService,
        error::{AppError, ErrorReport},
        feed::FeedService,
        gateway::{AuthGateway, Credentials, PostsGateway, ProfilesGateway, TodosGateway},
        profile::ProfileService,
        todos::TodoQueries,
    },
    cache::QueryCache,
    config::{self, Command, RemoteCommand, Settings, TodoCommand},
    domain::todos::Todo,
    infra::{
        error::InfraError,
        remote::{MemoryBackend, RestGateway},
        storage::FileStorage,
        telemetry,
    },
    stores::{LocalStorage, SessionStore, TodoStore},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("quire", error);
    eprintln!("error: {}", error.user_message());

    if dispatcher::has_been_set() {
        error!(source = report.source, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(source = report.source, chain = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        Command::Todo(command) => run_todo(&settings, command),
        Command::Remote(command) => {
            let app = build_remote_context(&settings)?;
            run_remote(&app, command).await
        }
        Command::SignIn(args) => {
            let app = build_remote_context(&settings)?;
            let session = app
                .auth
                .sign_in(Credentials {
                    email: args.email,
                    password: args.password,
                })
                .await?;
            println!(
                "signed in as {} ({})",
                session.user.email.as_deref().unwrap_or("unknown"),
                session.user.id
            );
            Ok(())
        }
    }
}

fn run_todo(settings: &Settings, command: TodoCommand) -> Result<(), AppError> {
    let storage = FileStorage::new(settings.storage.directory.clone())
        .map_err(|err| AppError::from(InfraError::Io(err)))?;
    info!(
        target = "quire::todo",
        directory = %storage.root().display(),
        "Opening todo store"
    );
    let storage: Arc<dyn LocalStorage> = Arc::new(storage);
    let store = TodoStore::new(storage);

    match command {
        TodoCommand::Add { text } => {
            let id = store
                .add(&text)
                .ok_or_else(|| AppError::validation("todo text must not be blank"))?;
            println!("{id}");
        }
        TodoCommand::Toggle { id } => {
            if !store.toggle(&id) {
                return Err(AppError::not_found(format!("todo {id}")));
            }
        }
        TodoCommand::Edit { id, text } => {
            if text.trim().is_empty() {
                return Err(AppError::validation("todo text must not be blank"));
            }
            if !store.update(&id, &text) {
                return Err(AppError::not_found(format!("todo {id}")));
            }
        }
        TodoCommand::Remove { id } => {
            if !store.remove(&id) {
                return Err(AppError::not_found(format!("todo {id}")));
            }
        }
        TodoCommand::List { filter } => {
            store.set_filter(filter);
            for todo in store.filtered() {
                println!("{}", format_todo(&todo));
            }
        }
        TodoCommand::ClearCompleted => {
            let removed = store.clear_completed();
            println!("removed {removed}");
        }
    }
    Ok(())
}

fn format_todo(todo: &Todo) -> String {
    let mark = if todo.completed { "x" } else { " " };
    format!("[{mark}] {}  {}", todo.id, todo.text)
}

struct RemoteContext {
    todos: TodoQueries,
    feed: FeedService,
    profiles: ProfileService,
    auth: AuthService,
}

struct Gateways {
    todos: Arc<dyn TodosGateway>,
    posts: Arc<dyn PostsGateway>,
    profiles: Arc<dyn ProfilesGateway>,
    auth: Arc<dyn AuthGateway>,
}

fn build_gateways(settings: &Settings, session: &SessionStore) -> Result<Gateways, AppError> {
    if settings.remote.url.is_some() {
        let rest = Arc::new(RestGateway::new(&settings.remote, session.clone())?);
        return Ok(Gateways {
            todos: rest.clone(),
            posts: rest.clone(),
            profiles: rest.clone(),
            auth: rest,
        });
    }

    warn!(
        target = "quire::remote",
        "remote.url is not configured; using the in-memory backend"
    );
    let memory = Arc::new(MemoryBackend::new());
    Ok(Gateways {
        todos: memory.clone(),
        posts: memory.clone(),
        profiles: memory.clone(),
        auth: memory,
    })
}

fn build_remote_context(settings: &Settings) -> Result<RemoteContext, AppError> {
    let session = SessionStore::new();
    let gateways = build_gateways(settings, &session)?;

    let cache = QueryCache::new(settings.cache.clone());
    // Dropped with the last cache handle.
    let _sweeper = cache.spawn_sweeper();

    Ok(RemoteContext {
        todos: TodoQueries::new(cache.clone(), gateways.todos),
        feed: FeedService::new(cache.clone(), gateways.posts, session.clone()),
        profiles: ProfileService::new(cache.clone(), gateways.profiles, session.clone()),
        auth: AuthService::new(gateways.auth, session, cache),
    })
}

async fn run_remote(app: &RemoteContext, command: RemoteCommand) -> Result<(), AppError> {
    match command {
        RemoteCommand::Todos => {
            for todo in app.todos.items().await? {
                let mark = if todo.completed { "x" } else { " " };
                println!("[{mark}] {}  {}", todo.id, todo.title);
            }
        }
        RemoteCommand::Todo { id } => {
            let todo = app.todos.detail(id).await?;
            print_json(&todo)?;
        }
        RemoteCommand::Posts => {
            for post in app.feed.posts().await? {
                println!("{}  {}", post.id, post.content);
            }
        }
        RemoteCommand::Profile { id } => {
            let profile = app.profiles.load(id).await?;
            print_json(&profile)?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
