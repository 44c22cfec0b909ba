// tests/shell.rs

use shell_toolkit::system::handlers::CaptureOutput;
use shell_toolkit::system::monitor::ExitStatus;
use shell_toolkit::system::shell::{ShellCmd, ShellError, shell_arguments};
use shell_toolkit::system::spawn::{IoMode, SpawnContext, SpawnError, StreamReader, Streams};

fn sh() -> ShellCmd {
    ShellCmd::new().with_shell("/bin/sh")
}

#[test]
fn test_words_are_passed_literally() {
    let output = sh()
        .run_capture(["echo", "$HOME", "a;b", "it's"], None)
        .expect("run shell");
    assert_eq!(output.stdout, "$HOME a;b it's\n");
    assert!(output.success());
}

#[test]
fn test_streams_and_exit_status() {
    let stdout = CaptureOutput::new();
    let streams = Streams {
        stdout: StreamReader::reader(stdout.clone()),
        ..Streams::default()
    };
    let status = sh()
        .with_context(&SpawnContext::new().with_default_io_mode(IoMode::Pipe))
        .run_and_wait(["printf", "%s-%s", "x", "y"], streams)
        .expect("run shell");
    assert!(status.success());
    assert_eq!(stdout.string(), "x-y");

    let status = sh()
        .run_and_wait(["false"], Streams::default())
        .expect("run shell");
    assert_eq!(status, ExitStatus::Exited(1));
}

#[test]
fn test_empty_arguments_do_nothing() {
    let status = ShellCmd::new()
        .with_shell("/definitely/not/a/shell")
        .run_and_wait(Vec::<String>::new(), Streams::default())
        .expect("no-op");
    assert_eq!(status, ExitStatus::Exited(0));
    assert_eq!(shell_arguments(Vec::<String>::new()), None);
}

#[test]
fn test_missing_shell_is_reported() {
    let result = ShellCmd::new()
        .with_shell("/definitely/not/a/shell")
        .run_and_wait(["true"], Streams::default());
    assert!(matches!(
        result,
        Err(ShellError::Spawn(SpawnError::CommandNotFound(_)))
    ));
}

#[tokio::test]
async fn test_async_capture_through_shell() {
    let output = sh()
        .run_capture_async(["tr", "a-z", "A-Z"], Some("quiet"))
        .await
        .expect("run shell");
    assert_eq!(output.stdout, "QUIET");
}
