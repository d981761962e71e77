//! Command framing and output delivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;

use powershell_session::shell::{
    conduits, CommandOutput, ConduitReceivers, ErrorLine, Session,
};
use powershell_session::SessionConfig;

use crate::common::{FakeShell, Reply, SequenceTokens};

async fn session(shell: &FakeShell) -> Session {
    Session::new(shell)
        .await
        .unwrap()
        .with_token_source(Arc::new(SequenceTokens::default()))
}

#[tokio::test]
async fn command_is_wrapped_with_boundaries() {
    let shell = FakeShell::new();
    let mut session = session(&shell).await;

    session.execute("Get-Date").await.unwrap();

    assert_eq!(
        shell.raw_input(),
        vec![
            "Get-Date; echo '$gorilla000000000000$'; \
             [Console]::Error.WriteLine('$gorilla000000000001$')\r\n"
                .to_string()
        ]
    );
    assert_eq!(shell.commands(), vec!["Get-Date".to_string()]);
}

#[tokio::test]
async fn output_round_trips_in_order() {
    let shell = FakeShell::new();
    shell.reply(
        Reply::stdout(&["first", "", "  indented", "tab\there", "last"])
            .with_stderr(&["warning: something"]),
    );
    let mut session = session(&shell).await;

    let output = session.execute("Get-Things").await.unwrap();

    assert_eq!(output.stdout, vec!["first", "", "  indented", "tab\there", "last"]);
    assert_eq!(
        output.stderr,
        vec![ErrorLine::Diagnostic("warning: something".to_string())]
    );
    assert_eq!(output.stdout_text(), "first\n\n  indented\ntab\there\nlast");
}

#[tokio::test]
async fn carriage_returns_never_reach_caller() {
    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&["abc", "def"]));
    let mut session = session(&shell).await;

    let output = session.execute("x").await.unwrap();

    assert_eq!(output.stdout, vec!["abc", "def"]);
    assert!(output.stdout.iter().all(|l| !l.contains('\r')));
}

#[tokio::test]
async fn near_boundaries_are_ordinary_output() {
    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&["{out}x", "x{out}", " {out}", "{err}"]).with_stderr(&["{out}"]));
    let mut session = session(&shell).await;

    let output = session.execute("x").await.unwrap();

    let out = "$gorilla000000000000$";
    let err = "$gorilla000000000001$";
    assert_eq!(
        output.stdout,
        vec![
            format!("{out}x"),
            format!("x{out}"),
            format!(" {out}"),
            err.to_string(),
        ]
    );
    assert_eq!(output.stderr, vec![ErrorLine::Diagnostic(out.to_string())]);
}

#[tokio::test]
async fn commands_run_in_sequence() {
    let shell = FakeShell::new();
    shell
        .reply(Reply::stdout(&["1"]))
        .reply(Reply::stdout(&["2a", "2b"]).with_stderr(&["e2"]))
        .reply(Reply::stdout(&[]));
    let mut session = session(&shell).await;

    let first = session.execute("one").await.unwrap();
    let second = session.execute("two").await.unwrap();
    let third = session.execute("three").await.unwrap();

    assert_eq!(first.stdout, vec!["1"]);
    assert!(first.stderr.is_empty());
    assert_eq!(second.stdout, vec!["2a", "2b"]);
    assert_eq!(second.stderr_text(), "e2");
    assert_eq!(third, CommandOutput::default());
    assert_eq!(shell.commands(), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn large_output_with_single_slot_conduits() {
    let lines: Vec<String> = (0..2_000).map(|i| format!("line {i}")).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&refs).with_stderr(&refs));
    let mut session = session(&shell).await;
    assert_eq!(session.config().channel_buffer(), 1);

    let output = session.execute("Get-ChildItem -Recurse").await.unwrap();

    assert_eq!(output.stdout, lines);
    assert_eq!(output.stderr.len(), lines.len());
}

#[tokio::test]
async fn stderr_can_finish_before_stdout() {
    let shell = FakeShell::new();
    shell.reply(
        Reply::stdout(&["out 1", "out 2"])
            .with_stderr(&["err 1"])
            .stderr_first(Duration::from_millis(200)),
    );
    let mut session = session(&shell).await;

    let (tx, rx) = conduits(16);
    let ConduitReceivers {
        stdout: mut stdout_rx,
        stderr: mut stderr_rx,
    } = rx;

    let execute = session.execute_into("x", tx);
    tokio::pin!(execute);

    let mut stderr_lines = Vec::new();
    loop {
        tokio::select! {
            _ = &mut execute => panic!("execute returned before stderr closed"),
            line = stderr_rx.recv() => match line {
                Some(line) => stderr_lines.push(line),
                None => break,
            },
        }
    }

    assert_eq!(stderr_lines, vec![ErrorLine::Diagnostic("err 1".to_string())]);
    assert!(matches!(stdout_rx.try_recv(), Err(TryRecvError::Empty)));

    execute.await.unwrap();

    assert_eq!(stdout_rx.recv().await.as_deref(), Some("out 1"));
    assert_eq!(stdout_rx.recv().await.as_deref(), Some("out 2"));
    assert_eq!(stdout_rx.recv().await, None);
}

#[tokio::test]
async fn stdout_can_finish_before_stderr() {
    let shell = FakeShell::new();
    shell.reply(
        Reply::stdout(&["out"])
            .with_stderr(&["late"])
            .stdout_first(Duration::from_millis(100)),
    );
    let mut session = session(&shell).await;

    let output = session.execute("x").await.unwrap();

    assert_eq!(output.stdout, vec!["out"]);
    assert_eq!(output.stderr_text(), "late");
}

#[tokio::test]
async fn conduits_are_closed_when_execute_returns() {
    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&["a"]).with_stderr(&["b"]));
    let mut session = session(&shell).await;

    let (tx, mut rx) = conduits(8);
    session.execute_into("x", tx).await.unwrap();

    assert_eq!(rx.stdout.try_recv().as_deref(), Ok("a"));
    assert!(matches!(rx.stdout.try_recv(), Err(TryRecvError::Disconnected)));
    assert_eq!(
        rx.stderr.try_recv(),
        Ok(ErrorLine::Diagnostic("b".to_string()))
    );
    assert!(matches!(rx.stderr.try_recv(), Err(TryRecvError::Disconnected)));
}

#[tokio::test]
async fn dropped_receivers_keep_streams_in_sync() {
    let shell = FakeShell::new();
    shell
        .reply(Reply::stdout(&["ignored 1", "ignored 2", "ignored 3"]).with_stderr(&["ignored"]))
        .reply(Reply::stdout(&["kept"]));
    let mut session = session(&shell).await;

    let (tx, rx) = conduits(1);
    drop(rx);
    session.execute_into("noisy", tx).await.unwrap();

    let output = session.execute("quiet").await.unwrap();
    assert_eq!(output.stdout, vec!["kept"]);
    assert!(output.stderr.is_empty());
}

#[tokio::test]
async fn generous_deadline_does_not_interfere() {
    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&["done"]));
    let config = SessionConfig::default().with_command_timeout(Duration::from_secs(10));
    let mut session = Session::with_config(&shell, config).await.unwrap();

    let output = session.execute("x").await.unwrap();
    assert_eq!(output.stdout, vec!["done"]);
    assert!(!session.is_closed());
}
