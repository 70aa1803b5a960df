// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! Count one Senate election from a specification file, writing the full
//! distribution of preferences transcript. Exit status is 0 only for a
//! completed count; an abandoned count still persists whatever transcript
//! it produced.

use std::fs::File;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use scrutiny::engine::CountEngine;
use scrutiny::metadata::CandidateId;
use scrutiny::tie_resolution::{TieBreakOracle, TieBreakTable, TieQuestion};
use senate::election::ElectionSpecification;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Count a Senate election under Section 273 of the Commonwealth Electoral
/// Act 1918, producing the round-by-round distribution of preferences.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// The election specification file (JSON).
    election : PathBuf,

    /// Directory the transcript is written into.
    out_dir : PathBuf,

    /// Ask on stdin when a tie is settled neither by earlier rounds nor by
    /// the specification's automation table. Without this, such a tie
    /// abandons the count.
    #[arg(long)]
    prompt_ties : bool,
}

/// The specification's automation table first; a human on stdin after that,
/// if allowed.
struct AppOracle {
    table : TieBreakTable,
    prompt : bool,
}

impl TieBreakOracle for AppOracle {
    fn resolve(&mut self,question:&TieQuestion) -> Option<CandidateId> {
        if let Some(answer) = self.table.resolve(question) { return Some(answer); }
        if self.prompt { prompt_for_choice(question) } else { None }
    }
}

fn prompt_for_choice(question:&TieQuestion) -> Option<CandidateId> {
    let ids = question.candidates.iter().map(|c|c.to_string()).collect::<Vec<_>>().join(", ");
    eprintln!("{:?} in round {} between candidate ids {}",question.context,question.round,ids);
    let stdin = std::io::stdin();
    loop {
        eprint!("candidate id this decision selects: ");
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return None, // end of input: decline
            Ok(_) => {}
        }
        match line.trim().parse::<u32>() {
            Ok(id) if question.candidates.contains(&CandidateId(id)) => return Some(CandidateId(id)),
            _ => eprintln!("not one of the tied candidates"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_|EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let opts : Opts = Opts::parse();

    let spec = ElectionSpecification::load(&opts.election)
        .with_context(||format!("loading {}",opts.election.display()))?;
    let input = spec.count_input()?;
    info!(election=%spec.name,vacancies=spec.vacancies.0,"counting");

    let mut oracle = AppOracle{ table: spec.automation.clone(), prompt: opts.prompt_ties };
    let engine = CountEngine::new(input,&mut oracle)?;

    std::fs::create_dir_all(&opts.out_dir)?;
    let transcript_path = opts.out_dir.join("transcript.json");
    match engine.run() {
        Ok(result) => {
            serde_json::to_writer_pretty(File::create(&transcript_path)?,&result)?;
            info!(quota=result.summary.quota,rounds=result.rounds.len(),"count complete");
            for (order,candidate) in result.summary.elected.iter().enumerate() {
                println!("{}. candidate {}",order+1,candidate);
            }
            Ok(())
        }
        Err(abandoned) => {
            serde_json::to_writer_pretty(File::create(&transcript_path)?,&abandoned.rounds)?;
            Err(anyhow::Error::new(abandoned.error)
                .context(format!("count abandoned after {} rounds; partial transcript written to {}",abandoned.rounds.len(),transcript_path.display())))
        }
    }
}
