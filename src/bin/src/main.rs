// Copyright 2024-present The Pregel Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod job;
mod run;

use clap::Parser;

#[derive(Parser)]
#[clap(name = "pregel", version, about = "Bulk synchronous graph computation")]
enum Command {
    Run(run::Command),
    Template(job::TemplateCommand),
}

fn main() {
    let result = match Command::parse() {
        Command::Run(cmd) => cmd.run(),
        Command::Template(cmd) => cmd.run(),
    };
    if let Err(err) = result {
        eprintln!("ERROR: {err:?}");
        std::process::exit(1);
    }
}
