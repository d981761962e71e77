//! Commands that never finish: truncation, deadlines and cancellation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use powershell_session::shell::{
    conduits, CommandOutput, Session, SessionError, SessionState, StreamKind,
};
use powershell_session::SessionConfig;

use crate::common::{FakeShell, Reply, StalledShell};

#[tokio::test]
async fn interpreter_death_truncates_and_closes() {
    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&["partial"]).with_stderr(&["boom"]).die());
    let mut session = Session::new(&shell).await.unwrap();

    let (tx, rx) = conduits(8);
    let (result, output) = tokio::join!(
        session.execute_into("Stop-Process -Id $PID", tx),
        CommandOutput::collect(rx)
    );

    assert!(matches!(
        result,
        Err(SessionError::Truncated {
            stream: StreamKind::Stdout
        })
    ));
    assert_eq!(output.stdout, vec!["partial"]);
    assert_eq!(output.stderr_text(), "boom");
    assert!(session.is_closed());
    assert_eq!(session.stats().failed, 1);
}

#[tokio::test]
async fn execute_after_truncation_is_rejected() {
    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&[]).die());
    let mut session = Session::new(&shell).await.unwrap();

    assert!(session.execute("exit 3").await.is_err());

    let err = session.execute("Get-Date").await.unwrap_err();
    assert!(matches!(err, SessionError::Closed { .. }));
    assert_eq!(shell.commands(), vec!["exit 3"]);
    assert!(matches!(
        session.exit().await,
        Err(SessionError::Closed { .. })
    ));
}

#[tokio::test]
async fn deadline_aborts_hung_command() {
    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&["started"]).hang());
    let config = SessionConfig::default().with_command_timeout(Duration::from_millis(100));
    let mut session = Session::with_config(&shell, config).await.unwrap();

    let (tx, rx) = conduits(8);
    let (result, output) = tokio::join!(
        session.execute_into("Read-Host", tx),
        CommandOutput::collect(rx)
    );

    assert!(
        matches!(result, Err(SessionError::Timeout(d)) if d == Duration::from_millis(100)),
        "unexpected result: {result:?}"
    );
    assert_eq!(output.stdout, vec!["started"]);
    assert!(session.is_closed());
    assert!(shell.was_terminated());
}

#[tokio::test]
async fn cancellation_aborts_hung_command() {
    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&[]).hang());
    let cancel = CancellationToken::new();
    let mut session = Session::new(&shell)
        .await
        .unwrap()
        .with_cancellation(cancel.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = session.execute("Start-Sleep 3600").await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, SessionError::Cancelled));
    assert!(err.closes_session());
    assert!(session.is_closed());
    assert!(shell.was_terminated());
}

#[tokio::test]
async fn cancelled_token_aborts_command() {
    let shell = FakeShell::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut session = Session::new(&shell)
        .await
        .unwrap()
        .with_cancellation(cancel);

    let err = session.execute("Get-Date").await.unwrap_err();

    assert!(matches!(err, SessionError::Cancelled));
    assert!(session.is_closed());
}

#[tokio::test]
async fn abandoned_command_closes_session() {
    let shell = FakeShell::new();
    shell.reply(Reply::stdout(&["waiting"]).hang());
    let mut session = Session::new(&shell).await.unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), session.execute("Read-Host")).await;

    assert!(abandoned.is_err());
    assert!(session.is_closed());
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.pid().is_none());
    assert!(shell.was_killed());
    assert!(matches!(
        session.execute("Get-Date").await,
        Err(SessionError::Closed { .. })
    ));
}

#[tokio::test]
async fn deadline_covers_blocked_write() {
    let shell = StalledShell::default();
    let config = SessionConfig::default().with_command_timeout(Duration::from_millis(50));
    let mut session = Session::with_config(&shell, config).await.unwrap();

    let (tx, rx) = conduits(8);
    let (result, output) = tokio::join!(
        session.execute_into("Get-Date", tx),
        CommandOutput::collect(rx)
    );

    assert!(
        matches!(result, Err(SessionError::Timeout(d)) if d == Duration::from_millis(50)),
        "unexpected result: {result:?}"
    );
    assert_eq!(output, CommandOutput::default());
    assert!(session.is_closed());
    assert_eq!(session.state(), SessionState::Closed);
    assert!(shell.was_terminated());
    assert_eq!(session.stats().failed, 1);
}

#[tokio::test]
async fn cancellation_covers_blocked_write() {
    let shell = StalledShell::default();
    let cancel = CancellationToken::new();
    let mut session = Session::new(&shell)
        .await
        .unwrap()
        .with_cancellation(cancel.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = session.execute("Get-Date").await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, SessionError::Cancelled));
    assert!(session.is_closed());
    assert!(shell.was_terminated());
}
