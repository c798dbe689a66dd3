// Drives the compiled binary through a PTY, exercising the real event loop
// and crossterm input handling.
//
// - Requires a TTY; expectrl allocates a pseudo terminal.
// - Unix-only and ignored by default.
// - Run manually via: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn leaving_from_the_intro_exits_cleanly() -> Result<(), Box<dyn std::error::Error>> {
    let bin = assert_cmd::cargo::cargo_bin("quizguard");
    let cmd = format!("{} --bundled rust-basics", bin.display());

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(200));

    p.send("q")?;
    p.expect(Eof)?;
    Ok(())
}

#[test]
#[ignore]
fn quitting_a_started_attempt_reaches_results() -> Result<(), Box<dyn std::error::Error>> {
    let bin = assert_cmd::cargo::cargo_bin("quizguard");
    let cmd = format!("{} --bundled rust-basics", bin.display());

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(200));

    // start, Ctrl+Q, confirm, then leave the results screen
    p.send("\r")?;
    std::thread::sleep(Duration::from_millis(200));
    p.send("\x11")?;
    std::thread::sleep(Duration::from_millis(100));
    p.send("y")?;
    std::thread::sleep(Duration::from_millis(200));
    p.send("q")?;

    p.expect(Eof)?;
    Ok(())
}
