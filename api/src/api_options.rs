use clap::{crate_description, crate_name, App, Arg, ArgMatches};

pub fn parse<'a>() -> ArgMatches<'a> {
    App::new(crate_name!())
        .about(crate_description!())
        .version(env!("CARGO_PKG_VERSION"))
        .arg({
            Arg::with_name("host")
                .short("H")
                .long("host")
                .value_name("HOST")
                .takes_value(true)
                .global(true)
                .help("JSON-RPC listener address")
        })
        .get_matches()
}
