use log::{error, info};
use rfactory::core::execution::{Simulation, SimulationConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let config = SimulationConfig::from_env();
    println!("=== Factory Simulation ===");
    println!(
        "Rounds: {}, producers/round: {}, companies: {}, thieves: {}, seed: {:?}",
        config.rounds,
        config.producers_per_round,
        config.companies.count,
        config.thieves.count,
        config.random_seed
    );

    let report = match Simulation::new(config).and_then(Simulation::run) {
        Ok(report) => report,
        Err(e) => {
            error!("Simulation failed: {}", e);
            eprintln!("Simulation failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("[Simulation:{}] report: {:?}", report.run_id, report);
    println!("\nRun {}", report.run_id);
    println!("  Produced:        {}", report.produced);
    println!("  Simple buyers:   {}", report.simple_bought);
    println!("  Companies:       {} bought, {} returned", report.company_bought, report.returned);
    println!("  Stolen:          {} ({} ledger entries)", report.stolen, report.ledger_entries);
    println!("  Still available: {}", report.available);

    ExitCode::SUCCESS
}
