use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use quiz_core::model::UserId;
use quiz_core::session::{Phase, PhaseKind, SessionFault};
use services::{DailyQuizService, QuizSnapshot, SessionCommand, SessionRunner};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Play today's quiz on the terminal until it reaches a terminal phase and
/// the user quits.
pub async fn play(daily: Arc<DailyQuizService>, user: UserId) -> Result<()> {
    let quiz = daily.open(user).await?;
    let runner = SessionRunner::spawn(daily, quiz);
    let mut snapshots = runner.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut last = render(&runner.snapshot(), None);
    let mut last_error = None;
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                last = render(&snapshot, Some(last));
                if snapshot.command_error != last_error {
                    if let Some(err) = &snapshot.command_error {
                        println!("Not done: {err}.");
                    }
                    last_error = snapshot.command_error;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let snapshot = runner.snapshot();
                match parse_input(&line, &snapshot) {
                    Input::Command(command) => runner.send(command).await?,
                    Input::Quit => {
                        if !snapshot.is_terminal() {
                            runner.abandon().await?;
                            let mut rx = runner.subscribe();
                            let _ = rx.wait_for(QuizSnapshot::is_terminal).await;
                            render(&rx.borrow().clone(), Some(last));
                        }
                        break;
                    }
                    Input::Ignored => {}
                }
            }
        }
    }
    Ok(())
}

enum Input {
    Command(SessionCommand),
    Quit,
    Ignored,
}

fn parse_input(line: &str, snapshot: &QuizSnapshot) -> Input {
    match line.trim() {
        "q" | "quit" => Input::Quit,
        "r" | "retry" => Input::Command(SessionCommand::Retry),
        "s" | "save" => Input::Command(SessionCommand::Finalize),
        other => match other.parse::<usize>() {
            Ok(n) if n >= 1 && snapshot.question.is_some() => {
                Input::Command(SessionCommand::Select(n - 1))
            }
            _ => Input::Ignored,
        },
    }
}

/// What has already been printed: phase kind and question index.
type Rendered = (PhaseKind, usize);

fn render(snapshot: &QuizSnapshot, last: Option<Rendered>) -> Rendered {
    let index = snapshot.question.as_ref().map_or(0, |q| q.index);
    let key = (snapshot.phase.kind(), index);
    if last == Some(key) && snapshot.write_error.is_none() {
        return key;
    }

    match &snapshot.phase {
        Phase::Active { .. } => {
            if let Some(q) = &snapshot.question {
                println!();
                println!("Question {}/{}: {}", q.index + 1, q.total, q.text);
                for (i, option) in q.options.iter().enumerate() {
                    println!("  {}. {option}", i + 1);
                }
                println!(
                    "({}s, type a number, q to quit)",
                    q.remaining_secs.unwrap_or_default()
                );
            }
        }
        Phase::AnsweredPause { selected, .. } => {
            if let Some(q) = &snapshot.question {
                let correct = q.correct_index.and_then(|i| q.options.get(i));
                match (selected, correct) {
                    (Some(s), _) if Some(*s) == q.correct_index => println!("Correct!"),
                    (None, Some(answer)) => println!("Time's up! The answer was {answer}."),
                    (_, Some(answer)) => println!("Wrong. The answer was {answer}."),
                    _ => {}
                }
            }
        }
        Phase::Complete { score } => {
            println!();
            println!(
                "Done! {score}/{} correct, {} points, streak {}.",
                snapshot.answers.len(),
                snapshot.points,
                snapshot.streak
            );
            if let Some(err) = &snapshot.write_error {
                println!("Could not save your result ({err}). Type s to try again.");
            } else {
                println!("Come back tomorrow. Type q to exit.");
            }
        }
        Phase::Locked { unlock_at } => {
            println!("Already played today. Next quiz {}.", local(*unlock_at));
            println!("Type q to exit.");
        }
        Phase::Failed { unlock_at } => match unlock_at {
            Some(at) => println!("Quiz failed for today. Next quiz {}.", local(*at)),
            None => println!("Quiz abandoned. You can start again."),
        },
        Phase::Error(fault) => {
            match fault {
                SessionFault::Unavailable => println!(
                    "Could not load today's questions{}.",
                    snapshot
                        .fetch_error
                        .as_deref()
                        .map(|e| format!(": {e}"))
                        .unwrap_or_default()
                ),
                SessionFault::Structural(err) => println!("Quiz is broken: {err}."),
            }
            println!("Type r to retry or q to quit.");
        }
    }
    key
}

fn local(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}
