//! Runs a batch of simulated jobs: each sleeps for a random number of seconds and jobs with an even id fail
use std::{process::ExitCode, thread, time::Duration};

use clap::Parser;
use rand::Rng;

use muster::{Batch, Job, JobId, Report};

#[derive(Parser)]
#[command(name = "muster", version, about)]
struct Cli {
    /// Number of jobs to run in total
    #[arg(long, default_value_t = 100)]
    jobs: usize,

    /// How many jobs can run in parallel at one time
    #[arg(long, default_value_t = 5)]
    max_concurrent: usize,

    /// Simulated jobs take a whole number of seconds below this
    #[arg(long, default_value_t = 5)]
    max_delay_secs: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("job {0} has an even id")]
struct EvenJob(JobId);

struct SimulatedJob {
    max_delay_secs: u64,
}

impl Job for SimulatedJob {
    type Error = EvenJob;

    fn execute(&self, id: JobId) -> Result<(), EvenJob> {
        println!("working on job {}...", id);
        if self.max_delay_secs > 0 {
            let secs = rand::thread_rng().gen_range(0..self.max_delay_secs);
            thread::sleep(Duration::from_secs(secs));
        }
        if id % 2 == 0 {
            println!("throwing error for job {}", id);
            return Err(EvenJob(id));
        }
        println!("Finished job {}!", id);
        Ok(())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> muster::Result<Report> {
    Batch::builder()
        .jobs(cli.jobs)
        .max_concurrent(cli.max_concurrent)
        .build(SimulatedJob {
            max_delay_secs: cli.max_delay_secs,
        })?
        .run()
}
