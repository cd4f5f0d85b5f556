/*
 * This file is part of netprobe.
 *
 * netprobe is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * netprobe is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with netprobe.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::process;
use std::sync::{Arc, Mutex};

use clap::Parser;

use netprobe::args::Args;
use netprobe::recorder::StatRecorder;
use netprobe::{client, server};

fn main() {
    let args = Args::parse();

    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    let recorder = match build_recorder(&args) {
        Ok(recorder) => Arc::new(Mutex::new(recorder)),
        Err(e) => {
            log::error!("unable to open the statistics sink: {}", e);
            process::exit(1);
        }
    };

    let outcome = if args.server {
        //interruption is the expected way to stop a server
        match ctrlc2::set_handler(|| {
            if server::kill() {
                log::info!("shutdown requested; draining");
            }
            true
        }) {
            Ok(_) => (),
            Err(e) => log::warn!("unable to install the interrupt handler: {}", e),
        }
        server::serve(&args, Arc::clone(&recorder))
    } else if args.client.is_some() {
        client::run(&args, &recorder)
    } else {
        log::error!("either --server or --client must be specified; see --help");
        process::exit(1);
    };

    if let Err(e) = &outcome {
        log::error!("{}", e);
    }

    {
        let mut recorder = recorder.lock().unwrap();
        let summary = recorder.summarize();
        if args.json {
            match serde_json::to_string_pretty(&summary) {
                Ok(rendered) => println!("{}", rendered),
                Err(e) => log::error!("unable to render the summary: {}", e),
            }
        } else {
            println!("{}", summary);
        }
        recorder.close();
    }

    if outcome.is_err() {
        process::exit(1);
    }
}

fn build_recorder(args: &Args) -> netprobe::Result<StatRecorder> {
    if args.no_csv {
        Ok(StatRecorder::new())
    } else {
        log::debug!("writing statistics to {}", args.csv.display());
        StatRecorder::with_sink(&args.csv)
    }
}
