use std::process::ExitCode;
use std::sync::Arc;

use sendme::api::models::{Message, Participant, Role};
use sendme::credentials::FileCredentials;
use sendme::guard::{self, Access, View};
use sendme::listener::{MessageObserver, Notification};
use sendme::settings::Settings;
use sendme::storage::ConversationCache;
use sendme::validate::{ErrandForm, SignInForm, SignUpForm};
use sendme::workflow::{self, ErrandAction};
use sendme::{App, Error};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: sendme <command> [args]

  signin <email> <password>
  signup <customer|runner> <name> <email> <password>
  signout
  whoami
  errands
  post <title> <pickup> <dropoff> <price> [description]
  track <errand-id>
  accept|confirm|reject|complete <errand-id>
  chats
  thread <user-id> [name]
  send <user-id> <text...>
  listen";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "help" || args[0] == "--help" {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<(), Error> {
    let settings = Settings::load()?;
    let credentials = Arc::new(FileCredentials::open_default()?);
    let cache = if settings.cache_conversations {
        match ConversationCache::open_default() {
            Ok(cache) => Some(cache),
            Err(e) => {
                log::warn!("Conversation cache disabled: {e}");
                None
            }
        }
    } else {
        None
    };
    let mut app = App::new(settings, credentials, cache)?;
    app.restore_session()?;

    let arg = |i: usize| -> Result<&str, Error> {
        args.get(i).map(String::as_str).ok_or_else(|| Error::Config(format!("missing argument\n{USAGE}")))
    };

    match args[0].as_str() {
        "signin" => {
            let form = SignInForm { email: arg(1)?.into(), password: arg(2)?.into() };
            let user = app.sign_in(&form).await?;
            println!("Signed in as {} ({})", user.name, user.role.label());
        }
        "signup" => {
            let role = parse_role(arg(1)?)?;
            let password = arg(4)?.to_string();
            let form = SignUpForm {
                name: arg(2)?.into(),
                email: arg(3)?.into(),
                confirm_password: password.clone(),
                password,
            };
            let user = app.sign_up(&form, role).await?;
            println!("Welcome, {}", user.name);
        }
        "signout" => {
            app.sign_out().await?;
            println!("Signed out");
        }
        "whoami" => match app.identity() {
            Some(user) => println!("{} <{}> {}", user.name, user.email, user.role.label()),
            None => println!("Not signed in"),
        },
        "errands" => {
            let home = gate(&app, None)?;
            app.fetch_errands().await?;
            let user = app.identity().ok_or(Error::NotSignedIn)?;
            app.store().read(|s| {
                let errands = &s.errands;
                if home == View::RunnerDashboard {
                    println!("Earnings: ₦{:.2}", errands.runner_earnings(&user.id));
                }
                for errand in &errands.errands {
                    let actions = workflow::available_actions(user.role, errand.status);
                    let actions: Vec<String> = actions.iter().map(ToString::to_string).collect();
                    println!(
                        "{}  {:<12} ₦{:<8.2} {}  [{}]",
                        errand.id,
                        errand.status,
                        errand.price,
                        errand.title,
                        actions.join(", ")
                    );
                }
            });
        }
        "post" => {
            gate(&app, Some(View::CustomerDashboard))?;
            let form = ErrandForm {
                title: arg(1)?.into(),
                pickup: arg(2)?.into(),
                dropoff: arg(3)?.into(),
                price: arg(4)?.into(),
                description: args.get(5).cloned().unwrap_or_default(),
            };
            let errand = app.post_errand(&form).await?;
            println!("Posted {} ({})", errand.id, errand.status);
        }
        "track" => {
            gate(&app, Some(View::Tracking))?;
            match app.track_errand(arg(1)?).await? {
                Some(errand) => {
                    let step = workflow::tracking_step(errand.status);
                    println!("{}: {}", errand.title, errand.status);
                    for (i, status) in workflow::TRACKING_STEPS.iter().enumerate() {
                        let mark = if i <= step { "x" } else { " " };
                        println!("  [{mark}] {status}");
                    }
                }
                None => println!("No errand with that id"),
            }
        }
        "accept" | "confirm" | "reject" | "complete" => {
            let action = match args[0].as_str() {
                "accept" => ErrandAction::Request,
                "confirm" => ErrandAction::Confirm,
                "reject" => ErrandAction::Reject,
                _ => ErrandAction::Complete,
            };
            gate(&app, None)?;
            let errand = app.advance_errand(arg(1)?, action).await?;
            println!("{} is now {}", errand.id, errand.status);
        }
        "chats" => {
            gate(&app, Some(View::Chat))?;
            app.open_conversation_list().await?;
            app.store().read(|s| {
                for c in &s.chat.conversations {
                    println!("{}  {:<20} {}", c.user.id, c.user.name, c.last_message.content);
                }
            });
        }
        "thread" => {
            gate(&app, Some(View::Chat))?;
            let user = Participant::new(arg(1)?, args.get(2).cloned().unwrap_or_default());
            app.open_conversation(user).await?;
            app.store().read(|s| {
                if let Some(errand) = &s.errands.active_request {
                    println!("Active errand: {} ({})", errand.title, errand.status);
                }
                for m in &s.chat.active_messages {
                    println!("[{}] {}: {}", m.created_at.format("%H:%M"), m.sender.name, m.content);
                }
            });
        }
        "send" => {
            gate(&app, Some(View::Chat))?;
            let user = Participant::new(arg(1)?, "");
            let text = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
            app.open_conversation(user).await?;
            let sent = app.send_message(&text, None).await?;
            println!("Sent {}", sent.id);
        }
        "listen" => {
            gate(&app, Some(View::Chat))?;
            app.add_observer(Arc::new(|note: &Notification, _: &Message| {
                println!("{}: {}", note.title, note.body);
            }) as Arc<dyn MessageObserver>);
            app.enable_push()?;
            let mut revisions = app.store().subscribe();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = revisions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let unread = app.store().read(|s| s.chat.unread_count);
                        log::debug!("Store revision {}, {unread} unread", *revisions.borrow());
                    }
                }
            }
        }
        other => return Err(Error::Config(format!("unknown command {other:?}\n{USAGE}"))),
    }
    Ok(())
}

fn parse_role(value: &str) -> Result<Role, Error> {
    match value {
        "customer" => Ok(Role::Customer),
        "runner" => Ok(Role::Runner),
        other => Err(Error::Validation {
            field: "role",
            message: format!("unknown role {other:?}, expected customer or runner"),
        }),
    }
}

/// Applies the route guard for `view`, or for the user's home when `None`.
fn gate(app: &App, view: Option<View>) -> Result<View, Error> {
    let target = match (view, app.identity()) {
        (Some(view), _) => view,
        (None, Some(user)) => guard::home(user.role),
        (None, None) => View::CustomerDashboard,
    };
    app.store().read(|s| match guard::check(&s.session, target) {
        Access::Allow => Ok(target),
        Access::RedirectToSignIn => Err(Error::NotSignedIn),
        // Every role-restricted view belongs to exactly one role.
        Access::Redirect(_) => Err(Error::WrongRole {
            required: match s.session.role() {
                Some(Role::Runner) => Role::Customer,
                _ => Role::Runner,
            },
        }),
    })
}
