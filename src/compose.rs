use crate::env::Environment;
use crate::error::{Result, StackError};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// One external process call: program plus argument tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// `<docker> compose --profile <p>... -f <compose file>`, shared by down/build/up.
#[derive(Debug, Clone)]
pub struct ComposeCommand {
    base: Invocation,
}

impl ComposeCommand {
    pub fn new(docker_bin: &str, profiles: &[String], compose_file: &Path) -> Self {
        let mut args = vec!["compose".to_string()];
        for profile in profiles {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args.push("-f".to_string());
        args.push(compose_file.display().to_string());

        ComposeCommand {
            base: Invocation {
                program: docker_bin.to_string(),
                args,
            },
        }
    }

    pub fn subcommand(&self, verb: &str) -> Invocation {
        let mut inv = self.base.clone();
        inv.args.push(verb.to_string());
        inv
    }

    pub fn down(&self) -> Invocation {
        self.subcommand("down")
    }

    pub fn build(&self) -> Invocation {
        self.subcommand("build")
    }

    pub fn up(&self) -> Invocation {
        self.subcommand("up")
    }
}

/// Runs an invocation to completion and reports its exit code.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        inv: &Invocation,
        env: &Environment,
    ) -> impl std::future::Future<Output = Result<i32>> + Send;
}

/// Spawns the real orchestrator from the project root with inherited stdio.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    pub cwd: PathBuf,
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, inv: &Invocation, env: &Environment) -> Result<i32> {
        tracing::info!("running: {}", inv);

        let status = Command::new(&inv.program)
            .current_dir(&self.cwd)
            .args(&inv.args)
            .envs(env.vars())
            .status()
            .await
            .map_err(|source| StackError::Spawn {
                program: inv.program.clone(),
                source,
            })?;
        Ok(status.code().unwrap_or(if status.success() { 0 } else { 1 }))
    }
}

async fn run_checked<R: CommandRunner>(runner: &R, inv: &Invocation, env: &Environment) -> Result<()> {
    let code = runner.run(inv, env).await?;
    if code == 0 {
        Ok(())
    } else {
        Err(StackError::CommandFailed {
            command: inv.to_string(),
            code,
        })
    }
}

/// Optional build, then down, then up; strictly one after another.
pub async fn bring_up<R: CommandRunner>(
    runner: &R,
    compose: &ComposeCommand,
    env: &Environment,
    build: bool,
) -> Result<()> {
    if build {
        run_checked(runner, &compose.build(), env).await?;
    }

    // Clear stale networks/containers from a previous run. Whatever goes wrong
    // here (including a failed spawn) must not stop the stack from coming up.
    match runner.run(&compose.down(), env).await {
        Ok(0) => {}
        Ok(code) => tracing::warn!("teardown exited with {}, continuing", code),
        Err(e) => tracing::warn!("teardown failed: {}, continuing", e),
    }

    run_checked(runner, &compose.up(), env).await
}

/// Lines printed for `--dry-run`.
pub fn dry_run_lines(compose: &ComposeCommand, build: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if build {
        lines.push(format!("Command (build): {}", compose.build()));
    }
    lines.push(format!("Command (down): {}", compose.down()));
    lines.push(format!("Command (up): {}", compose.up()));
    lines
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::fake::FakeRunner;

    fn compose(profiles: &[&str]) -> ComposeCommand {
        let profiles: Vec<String> = profiles.iter().map(|p| p.to_string()).collect();
        ComposeCommand::new("docker", &profiles, &PathBuf::from("/srv/app/docker-compose.yaml"))
    }

    #[test]
    fn test_command_tokens() {
        let cmd = compose(&["go", "ts"]);
        assert_eq!(
            cmd.up().args,
            vec![
                "compose",
                "--profile",
                "go",
                "--profile",
                "ts",
                "-f",
                "/srv/app/docker-compose.yaml",
                "up"
            ]
        );
        assert_eq!(cmd.down().program, "docker");
        assert_eq!(cmd.build().args.last().map(String::as_str), Some("build"));
    }

    #[test]
    fn test_duplicate_profiles_pass_through() {
        let cmd = compose(&["go", "go"]);
        assert_eq!(
            cmd.down().to_string(),
            "docker compose --profile go --profile go -f /srv/app/docker-compose.yaml down"
        );
    }

    #[test]
    fn test_dry_run_lines() {
        let cmd = compose(&["go", "ts"]);
        assert_eq!(
            dry_run_lines(&cmd, false),
            vec![
                "Command (down): docker compose --profile go --profile ts -f /srv/app/docker-compose.yaml down",
                "Command (up): docker compose --profile go --profile ts -f /srv/app/docker-compose.yaml up",
            ]
        );

        let lines = dry_run_lines(&compose(&[]), true);
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Command (build): docker compose -f /srv/app/docker-compose.yaml build"
        );
    }

    #[tokio::test]
    async fn test_down_then_up() {
        let runner = FakeRunner::default();
        bring_up(&runner, &compose(&["go"]), &Environment::default(), false)
            .await
            .unwrap();
        assert_eq!(runner.verbs(), vec!["down", "up"]);
    }

    #[tokio::test]
    async fn test_build_runs_first() {
        let runner = FakeRunner::default();
        bring_up(&runner, &compose(&[]), &Environment::default(), true)
            .await
            .unwrap();
        assert_eq!(runner.verbs(), vec!["build", "down", "up"]);
    }

    #[tokio::test]
    async fn test_failed_build_aborts() {
        let runner = FakeRunner::failing("build", 3);
        let err = bring_up(&runner, &compose(&[]), &Environment::default(), true)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(runner.verbs(), vec!["build"]);
    }

    #[tokio::test]
    async fn test_failed_down_is_ignored() {
        let runner = FakeRunner::failing("down", 1);
        bring_up(&runner, &compose(&[]), &Environment::default(), false)
            .await
            .unwrap();
        assert_eq!(runner.verbs(), vec!["down", "up"]);
    }

    #[tokio::test]
    async fn test_failed_up_propagates_status() {
        let runner = FakeRunner::failing("up", 130);
        let err = bring_up(&runner, &compose(&["go"]), &Environment::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::CommandFailed { code: 130, .. }));
        assert_eq!(err.exit_code(), 130);
        assert_eq!(runner.verbs(), vec!["down", "up"]);
    }

    #[tokio::test]
    async fn test_environment_reaches_every_call() {
        let runner = FakeRunner::default();
        let mut env = Environment::default();
        env.set("BUILD_PROFILE", "debug");

        bring_up(&runner, &compose(&[]), &env, true).await.unwrap();
        let seen = runner.seen_env.lock().unwrap().clone();
        assert_eq!(seen, vec![Some("debug".to_string()); 3]);
    }
}
