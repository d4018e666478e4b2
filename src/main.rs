use clap::Parser;
use tabstore::cli::{self, parsers::CliParser};

fn main() {
    dotenvy::dotenv().ok();
    cli::init_logging();

    let parser = CliParser::parse();
    std::process::exit(cli::run(parser));
}
