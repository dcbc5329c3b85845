use std::process::ExitCode;

fn main() -> ExitCode {
    gpt_auto_generator::run()
}
