use teamflow::bootstrap;
use teamflow::config::Config;
use teamflow::infrastructure::observability;
use teamflow::models::{LoginRequest, Project};
use teamflow::services::CollectionKey;

fn usage() -> String {
    "usage: teamflow <login EMAIL PASSWORD | logout | whoami | projects>".to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let _guard = observability::init(&config)?;
    tracing::info!("Configuration loaded");

    let client = bootstrap::build_client(config, None).await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["login", email, password] => {
            client
                .auth
                .login(LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .await?;
            println!("Logged in");
        }
        ["logout"] => {
            client.auth.logout().await?;
            println!("Logged out");
        }
        ["whoami"] => {
            let user = client.queries.current_user().await?;
            println!("{} <{}>", user.username, user.email);
        }
        ["projects"] => {
            let projects = client.queries.collection::<Project>();
            let mut view = projects
                .load(CollectionKey::ProjectList, client.queries.projects_fetcher())
                .await?;
            while view.has_more && view.last_error.is_none() {
                view = projects.load_more().await?;
            }
            for project in &view.items {
                println!("{:>6}  {:<8} {}", project.id, project.role.to_string(), project.title);
            }
            if let Some(kind) = view.last_error {
                eprintln!("List may be incomplete: {:?}", kind);
            }
        }
        _ => {
            eprintln!("{}", usage());
            std::process::exit(2);
        }
    }

    Ok(())
}
