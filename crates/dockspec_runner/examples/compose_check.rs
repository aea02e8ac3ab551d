//! Example: Checking a service inside a compose stack
//!
//! Brings up the stack described by a compose file, runs a few commands in
//! one service and tears everything down again.
//!
//! Run with: cargo run --example compose_check -- docker-compose.yml wordpress

use dockspec_runner::{CommandRunner, ComposeConfig, ExecOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let file = args
        .next()
        .unwrap_or_else(|| "docker-compose.yml".to_string());
    let service = args.next().unwrap_or_else(|| "wordpress".to_string());

    println!("=== dockspec compose check ===\n");

    let config = ComposeConfig::new(&file).container(&service).wait(5.0);

    let outcome = CommandRunner::builder(config)
        .scoped(|runner| {
            Box::pin(async move {
                for cmd in ["id", "uname -a", "cat /etc/os-release"] {
                    let result = runner.run_command(cmd, &ExecOptions::default()).await?;
                    println!("$ {} (exit {})", cmd, result.exit_status);
                    print!("{}", result.stdout());
                    if result.failure() {
                        eprint!("{}", result.stderr());
                    }
                }
                Ok(())
            })
        })
        .await;

    match outcome {
        Ok(()) => println!("\nStack {} checked and removed", file),
        Err(e) => println!("\nCompose check failed: {}", e),
    }

    Ok(())
}
