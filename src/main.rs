use std::process::ExitCode;

use clap::Parser;
use cutmaker::app::CutMakerApp;
use cutmaker::{cli, logger};
use eframe::egui;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    // -- CLI / headless mode ---------------------------------------------
    if let Some(command) = args.command {
        logger::init(args.verbose);
        return cli::run(command, args.verbose);
    }

    // -- GUI mode -----------------------------------------------------
    logger::init(false);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 500.0])
            .with_title("CutMaker"),
        ..Default::default()
    };

    match eframe::run_native(
        "CutMaker",
        options,
        Box::new(|cc| Box::new(CutMakerApp::new(cc))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Window could not be created: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
