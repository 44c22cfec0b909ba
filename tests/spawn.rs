// tests/spawn.rs

use shell_toolkit::system::command::SpawnCmd;
use shell_toolkit::system::handle::ProcessStatus;
use shell_toolkit::system::handlers::{
    CaptureOutput, InputCallback, InputChunk, OutputCallback, StringInput, output_channel,
};
use shell_toolkit::system::monitor::ExitStatus;
use shell_toolkit::system::spawn::{
    IoMode, Spawn, SpawnContext, SpawnError, StreamReader, StreamWriter,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[test]
fn test_exit_codes_are_reported() {
    let ok = Spawn::new("true").run_and_wait().expect("spawn true");
    assert_eq!(ok, ExitStatus::Exited(0));
    assert!(ok.success());

    let failed = Spawn::new("false").run_and_wait().expect("spawn false");
    assert_eq!(failed.code(), 1);
    assert!(!failed.success());
}

#[test]
fn test_signal_termination_is_decoded() {
    let status = Spawn::new("sh")
        .args(["-c", "kill -TERM $$"])
        .run_and_wait()
        .expect("spawn sh");
    assert_eq!(status.signal(), Some(libc::SIGTERM));
    assert_eq!(status.code(), 128 + libc::SIGTERM);
}

#[test]
fn test_pipe_captures_stdout() {
    let output = CaptureOutput::new();
    let status = Spawn::new("echo")
        .arg("Hello World")
        .io_mode(IoMode::Pipe)
        .stdout(StreamReader::reader(output.clone()))
        .run_and_wait()
        .expect("spawn echo");

    assert!(status.success());
    assert_eq!(output.string(), "Hello World\n");
}

#[test]
fn test_output_is_the_same_through_pipe_and_pty() {
    for mode in [IoMode::Pipe, IoMode::Pty] {
        let output = CaptureOutput::new();
        let status = Spawn::new("echo")
            .args(["-n", "hello world"])
            .io_mode(mode)
            .stdout(StreamReader::reader(output.clone()))
            .run_and_wait()
            .expect("spawn echo");

        assert!(status.success(), "{:?}", mode);
        assert_eq!(output.string(), "hello world", "{:?}", mode);
    }
}

#[test]
fn test_stdin_string_reaches_child() {
    let output = CaptureOutput::new();
    let status = Spawn::new("tr")
        .args(["a-z", "A-Z"])
        .io_mode(IoMode::Pipe)
        .stdin(StreamWriter::writer(StringInput::new("hello world")))
        .stdout(StreamReader::reader(output.clone()))
        .run_and_wait()
        .expect("spawn tr");

    assert!(status.success());
    assert_eq!(output.string(), "HELLO WORLD");
}

#[test]
fn test_stdin_string_reaches_child_over_pty() {
    for (input, expected) in [("hello world\n", "HELLO WORLD"), ("no newline", "NO NEWLINE")] {
        let output = CaptureOutput::new();
        let status = Spawn::new("tr")
            .args(["a-z", "A-Z"])
            .io_mode(IoMode::Pty)
            .stdin(StreamWriter::writer(StringInput::new(input)))
            .stdout(StreamReader::reader(output.clone()))
            .run_and_wait()
            .expect("spawn tr");

        assert!(status.success(), "{:?}", input);
        assert!(
            output.string().contains(expected),
            "{:?} gave {:?}",
            input,
            output.string()
        );
    }
}

#[test]
fn test_input_callback_streams_chunks() {
    let mut chunks = vec![InputChunk::last("three\n"), InputChunk::more("two\n"), InputChunk::more("one\n")];
    let output = CaptureOutput::new();
    let status = Spawn::new("cat")
        .io_mode(IoMode::Pipe)
        .stdin(StreamWriter::writer(InputCallback::new(move || {
            chunks.pop().unwrap_or_else(|| InputChunk::last(""))
        })))
        .stdout(StreamReader::reader(output.clone()))
        .run_and_wait()
        .expect("spawn cat");

    assert!(status.success());
    assert_eq!(output.string(), "one\ntwo\nthree\n");
}

#[test]
fn test_separate_stderr_handler() {
    let stdout = CaptureOutput::new();
    let stderr = CaptureOutput::new();
    Spawn::new("sh")
        .args(["-c", "echo out; echo err >&2"])
        .io_mode(IoMode::Pipe)
        .stdout(StreamReader::reader(stdout.clone()))
        .stderr(StreamReader::reader(stderr.clone()))
        .run_and_wait()
        .expect("spawn sh");

    assert_eq!(stdout.string(), "out\n");
    assert_eq!(stderr.string(), "err\n");
}

#[test]
fn test_output_callback_respects_chunk_size() {
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&sizes);
    Spawn::new("printf")
        .arg("0123456789")
        .io_mode(IoMode::Pipe)
        .stdout(StreamReader::reader(
            OutputCallback::new(move |chunk: &[u8]| {
                seen.lock().expect("lock").push(chunk.len());
            })
            .with_chunk_size(4),
        ))
        .run_and_wait()
        .expect("spawn printf");

    let sizes = sizes.lock().expect("lock").clone();
    assert_eq!(sizes.iter().sum::<usize>(), 10);
    assert!(sizes.iter().all(|size| *size <= 4));
}

#[test]
fn test_channel_output_iterates_until_close() {
    let (handler, receiver) = output_channel();
    let mut handle = Spawn::new("printf")
        .arg("a\\nb\\n")
        .io_mode(IoMode::Pipe)
        .stdout(StreamReader::reader(handler))
        .run()
        .expect("spawn printf");

    let collected: Vec<u8> = receiver.iter().flatten().collect();
    assert_eq!(collected, b"a\nb\n");
    assert!(handle.wait().success());
}

#[test]
fn test_wait_returns_while_a_descendant_keeps_writing() {
    for mode in [IoMode::Pipe, IoMode::Pty] {
        let output = CaptureOutput::new();
        let started = Instant::now();
        let status = Spawn::new("sh")
            .args(["-c", "(while echo x; do sleep 0.02; done) & exit 0"])
            .io_mode(mode)
            .stdout(StreamReader::reader(output.clone()))
            .run_and_wait()
            .expect("spawn sh");

        assert_eq!(status, ExitStatus::Exited(0), "{:?}", mode);
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "{:?}: wait took {:?}",
            mode,
            started.elapsed()
        );
    }
}

#[test]
fn test_command_not_found() {
    let result = Spawn::new("definitely-not-a-command-5a0").run();
    assert!(matches!(result, Err(SpawnError::CommandNotFound(_))));
}

#[test]
fn test_wait_twice_returns_cached_status() {
    let mut handle = Spawn::new("sh")
        .args(["-c", "exit 3"])
        .run()
        .expect("spawn sh");
    assert_eq!(handle.wait(), ExitStatus::Exited(3));
    assert_eq!(handle.wait(), ExitStatus::Exited(3));
    assert!(handle.did_finish_running());
    assert!(!handle.is_running());
    assert_eq!(handle.status(), Some(ExitStatus::Exited(3)));
}

#[test]
fn test_context_defaults_apply() {
    let dir = tempfile::tempdir().expect("tempdir");
    let canonical = dir.path().canonicalize().expect("canonical tempdir");
    let context = SpawnContext::new()
        .with_working_directory(&canonical)
        .with_default_io_mode(IoMode::Pipe);

    let output = CaptureOutput::new();
    let status = Spawn::new("pwd")
        .with_context(&context)
        .stdout(StreamReader::reader(output.clone()))
        .run_and_wait()
        .expect("spawn pwd");

    assert!(status.success());
    assert_eq!(output.string().trim_end(), canonical.to_string_lossy());
}

#[tokio::test]
async fn test_async_wait() {
    let output = SpawnCmd::new("echo")
        .run_capture_async(["-n", "async"], None)
        .await
        .expect("spawn echo");
    assert_eq!(output.stdout, "async");

    let status = Spawn::new("sh")
        .args(["-c", "exit 5"])
        .run_and_wait_async()
        .await
        .expect("spawn sh");
    assert_eq!(status.code(), 5);
}
