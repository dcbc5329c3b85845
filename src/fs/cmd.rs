use std::process::{Command, Stdio};

use anyhow::{anyhow, bail, Context, Result};

pub trait CheckCommandOutput {
    fn run(&mut self) -> Result<Vec<u8>>;

    fn run_with_status_checker<R>(&mut self, f: impl Fn(i32, Vec<u8>, Vec<u8>) -> Result<R>)
        -> Result<R>;
}

impl CheckCommandOutput for Command {
    fn run(&mut self) -> Result<Vec<u8>> {
        self.run_with_status_checker(|code, stdout, _| {
            if code != 0 {
                bail!("Bad exit code")
            } else {
                Ok(stdout)
            }
        })
    }

    fn run_with_status_checker<R>(
        &mut self,
        f: impl Fn(i32, Vec<u8>, Vec<u8>) -> Result<R>,
    ) -> Result<R> {
        // reset all locale settings for this command
        self.env("LC_ALL", "C");

        tracing::trace!(cmd=?self, "run external cmd");

        self.stdin(Stdio::null());
        self.stdout(Stdio::piped());
        self.stderr(Stdio::piped());

        let output = self
            .output()
            .map_err(anyhow::Error::from)
            .with_context(|| format!("cmd: {:?}", self))
            .context("Failed to execute external command")?;

        let stdout = output.stdout;
        let stderr = output.stderr;
        let code = output.status.code();

        match code {
            Some(code) => f(code, stdout.clone(), stderr.clone()),
            None => Err(anyhow!("killed by signal")),
        }
        .with_context(|| {
            let stdout = String::from_utf8_lossy(&stdout);
            let stderr = String::from_utf8_lossy(&stderr);
            format!(
                "\ncmd: {:?}\nexit code: {}\nstdout: {}\nstderr: {}",
                self,
                code.map(|code| code.to_string())
                    .unwrap_or("unknown".to_string()),
                if stdout.contains('\n') {
                    format!("(multi-line)\n\t{}", stdout.replace('\n', "\n\t"))
                } else {
                    stdout.into()
                },
                if stderr.contains('\n') {
                    format!("(multi-line)\n\t{}", stderr.replace('\n', "\n\t"))
                } else {
                    stderr.into()
                },
            )
        })
    }
}
