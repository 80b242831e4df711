use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde_json::json;

use naval_duel::services::{MemoryFleetStore, MemoryRecordStore, NoEffects};
use naval_duel::{
    init_logging, run_bot, AiMatch, AiMatchConfig, Board, CellStatus, Difficulty, FiringRule,
    InMemoryChannel, MatchTiming, RemoteMatch, RemoteMatchConfig, Side, BOARD_SIZE,
};

#[derive(Parser)]
#[command(author, version, about = "Two-player naval combat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play against the computer in the terminal.
    Play {
        #[arg(long, default_value = "normal", value_parser = parse_difficulty)]
        difficulty: Difficulty,
        #[arg(long, default_value = "one_shot", value_parser = parse_rule)]
        rule: FiringRule,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
    /// Let two bots play a remote match over an in-memory channel and print
    /// a JSON summary.
    Duel {
        #[arg(long, default_value_t = 1)]
        seed1: u64,
        #[arg(long, default_value_t = 2)]
        seed2: u64,
        #[arg(long, default_value = "one_shot", value_parser = parse_rule)]
        rule: FiringRule,
        #[arg(long, default_value = "normal", value_parser = parse_difficulty)]
        difficulty: Difficulty,
    },
}

fn parse_rule(s: &str) -> Result<FiringRule, String> {
    s.parse()
        .map_err(|()| format!("unknown rule '{}' (one_shot, chain_attacks, sequential_hits)", s))
}

fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    match s.to_ascii_lowercase().as_str() {
        "easy" => Ok(Difficulty::Easy),
        "normal" => Ok(Difficulty::Normal),
        "hard" => Ok(Difficulty::Hard),
        _ => Err(format!("unknown difficulty '{}' (easy, normal, hard)", s)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            difficulty,
            rule,
            seed,
        } => play(difficulty, rule, seed).await,
        Commands::Duel {
            seed1,
            seed2,
            rule,
            difficulty,
        } => duel(seed1, seed2, rule, difficulty).await,
    }
}

async fn play(difficulty: Difficulty, rule: FiringRule, seed: Option<u64>) -> anyhow::Result<()> {
    let timing = MatchTiming::from_env();
    timing.validate()?;

    let mut rng = match seed {
        Some(s) => SmallRng::seed_from_u64(s),
        None => SmallRng::from_rng(&mut rand::rng()),
    };
    let fleets = MemoryFleetStore::new();
    fleets.save_fleet("player", Board::random_fleet(&mut rng)?);
    let records = Arc::new(MemoryRecordStore::new());

    let config = AiMatchConfig {
        user_id: "player".to_string(),
        difficulty,
        rule,
        seed: seed.map(|s| s.wrapping_add(1)),
        timing,
    };
    let mut game = AiMatch::initialize(config, &fleets, records, Arc::new(NoEffects), None).await?;

    println!("Firing rule: {}, AI difficulty: {:?}", rule.name(), difficulty);
    println!("Enter a target like A5, or 'q' to retire.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while !game.engine().is_over() {
        let snap = game.snapshot();
        println!("\nEnemy waters ({} ships afloat):", snap.target_alive);
        print_board(&snap.target_board, false);
        println!("\nYour fleet ({} ships afloat):", snap.own_alive);
        print_board(&snap.own_board, true);
        print!("Target ({} shot(s) left): ", snap.turn.shots_remaining);
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            game.retire().await;
            break;
        };
        let line = line?;
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") {
            game.retire().await;
            break;
        }
        let (row, col) = match parse_coord(input) {
            Ok(coord) => coord,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        match game.fire(row, col).await {
            Some(report) => println!("{}: {}", coord_to_string(row, col), report.result),
            None => println!("{} cannot be fired at right now", coord_to_string(row, col)),
        }
    }

    let snap = game.snapshot();
    print_board(&snap.own_board, true);
    if let Some(outcome) = snap.outcome {
        if outcome.is_victory(Side::Local) {
            println!("\nVICTORY ({:?})", outcome.reason);
        } else {
            println!("\nDEFEAT ({:?})", outcome.reason);
        }
    }
    if let Some(warning) = snap.warning {
        println!("{}", warning);
    }
    Ok(())
}

async fn duel(seed1: u64, seed2: u64, rule: FiringRule, difficulty: Difficulty) -> anyhow::Result<()> {
    let channel = Arc::new(InMemoryChannel::new());
    let fleets = MemoryFleetStore::new();
    fleets.save_fleet("alpha", Board::random_fleet(&mut SmallRng::seed_from_u64(seed1))?);
    fleets.save_fleet("bravo", Board::random_fleet(&mut SmallRng::seed_from_u64(seed2))?);
    let records = Arc::new(MemoryRecordStore::new());

    let seat = |local: &str, peer: &str| RemoteMatchConfig {
        match_id: "duel".to_string(),
        local_id: local.to_string(),
        peer_id: peer.to_string(),
        peer_label: peer.to_string(),
        rule,
        timing: MatchTiming::instant(),
    };
    let alpha = RemoteMatch::initialize(
        seat("alpha", "bravo"),
        channel.clone(),
        &fleets,
        records.clone(),
        Arc::new(NoEffects),
    )
    .await?;
    let bravo = RemoteMatch::initialize(
        seat("bravo", "alpha"),
        channel.clone(),
        &fleets,
        records.clone(),
        Arc::new(NoEffects),
    )
    .await?;

    let (a, b) = tokio::join!(
        run_bot(&alpha, difficulty, seed1),
        run_bot(&bravo, difficulty, seed2)
    );
    let engine = alpha.engine().await;
    alpha.teardown();
    bravo.teardown();

    let winner = a.as_ref().or(b.as_ref()).map(|o| o.winner_name.clone());
    let reason = a.as_ref().or(b.as_ref()).map(|o| format!("{:?}", o.reason));
    let shots = |id: &str| engine.move_log().iter().filter(|m| m.actor_id == id).count();
    let result = json!({
        "rule": rule.name(),
        "winner": winner,
        "reason": reason,
        "alpha": {"victory": a.map(|o| o.is_victory(Side::Local)), "shots": shots("alpha")},
        "bravo": {"victory": b.map(|o| o.is_victory(Side::Local)), "shots": shots("bravo")},
        "records": records.records().len(),
    });
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn coord_to_string(r: usize, c: usize) -> String {
    let col = (b'A' + c as u8) as char;
    format!("{}{}", col, r + 1)
}

fn parse_coord(input: &str) -> Result<(usize, usize), String> {
    let mut chars = input.chars();
    let col_ch = chars
        .next()
        .ok_or("Empty input")?
        .to_ascii_uppercase();
    if !col_ch.is_ascii_alphabetic() {
        return Err(format!("Invalid column '{}' - must be a letter A-H", col_ch));
    }
    let col = (col_ch as u8 - b'A') as usize;
    if col >= BOARD_SIZE {
        return Err(format!("Column '{}' out of bounds - must be A-H", col_ch));
    }
    let row_str: String = chars.collect();
    let row: usize = row_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid row '{}' - must be a number 1-8", row_str))?;
    if row == 0 || row > BOARD_SIZE {
        return Err(format!("Row {} out of bounds - must be 1-8", row));
    }
    Ok((row - 1, col))
}

fn print_board(board: &Board, reveal: bool) {
    print!("    ");
    for c in 0..BOARD_SIZE {
        print!(" {}", (b'A' + c as u8) as char);
    }
    println!();
    for (r, row) in board.rows().enumerate() {
        print!("  {:2}", r + 1);
        for cell in row {
            let ch = match cell.status {
                CellStatus::Hit => 'X',
                CellStatus::Miss => 'o',
                CellStatus::Ship if reveal => 'S',
                _ => '.',
            };
            print!(" {}", ch);
        }
        println!();
    }
    if reveal {
        println!("    Legend: S=Ship  X=Hit  o=Miss  .=Water");
    } else {
        println!("    Legend: X=Hit  o=Miss  .=Unknown");
    }
}
