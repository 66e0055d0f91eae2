use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    ArgMatches, Command,
};
use sprig::{
    api::{self, BuildTarget, OverrideSources},
    app::App,
    options::ENV_VAR,
    plugins::Toolchain,
};
use std::path::PathBuf;

// The CLI layer should only parse inputs and forward them to library code.
fn main() -> miette::Result<()> {
    let matches = Command::new(crate_name!())
        .about(crate_description!())
        .author(crate_authors!())
        .version(crate_version!())
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .help("Project root that option paths are relative to")
                .value_parser(value_parser!(PathBuf))
                .default_value(".")
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Options file to use instead of Sprig.toml in the project root")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .help("Override a single option, e.g. --set source.name=main")
                .value_name("KEY=VALUE")
                .action(ArgAction::Append)
                .global(true),
        )
        .arg(
            Arg::new("devel")
                .long("devel")
                .help("Development build: source maps and live reload")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("build")
                .about("Composes the application tree and writes it to the output directory")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Output directory, relative to the project root")
                        .value_parser(value_parser!(PathBuf))
                        .default_value("dist"),
                )
                .arg(
                    Arg::new("clean")
                        .long("clean")
                        .help("Remove the output directory before writing")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Preview the composed tree without writing it")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("sass")
                        .long("sass")
                        .help("Sass executable")
                        .default_value("sass"),
                )
                .arg(
                    Arg::new("esbuild")
                        .long("esbuild")
                        .help("esbuild executable")
                        .default_value("esbuild"),
                )
                .arg(
                    Arg::new("transpiler")
                        .long("transpiler")
                        .help("How script modules are transpiled before bundling")
                        .value_parser(["esbuild", "none"])
                        .default_value("esbuild"),
                ),
        )
        .subcommand(Command::new("config").about("Prints the merged options as TOML"))
        .get_matches();

    let is_verbose = matches.get_flag("verbose");

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if is_verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    let app = load_app(&matches)?;

    match matches.subcommand() {
        Some(("build", args)) => handle_build(&app, args),
        Some(("config", _)) => handle_config(&app),
        _ => unreachable!(),
    }
}

fn load_app(matches: &ArgMatches) -> miette::Result<App> {
    let root = matches
        .get_one::<PathBuf>("root")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));

    let sources = OverrideSources {
        config: matches.get_one::<PathBuf>("config").cloned(),
        env_mode: std::env::var(ENV_VAR).ok(),
        devel: matches.get_flag("devel"),
        sets: matches
            .get_many::<String>("set")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
    };

    let overrides = api::load_overrides(&root, &sources)?;

    Ok(App::with_root(root, &overrides)?)
}

fn handle_build(app: &App, args: &ArgMatches) -> miette::Result<()> {
    let sass = args.get_one::<String>("sass").map_or("sass", String::as_str);
    let esbuild = args
        .get_one::<String>("esbuild")
        .map_or("esbuild", String::as_str);
    let transpile = args
        .get_one::<String>("transpiler")
        .map_or(true, |transpiler| transpiler == "esbuild");

    let target = BuildTarget {
        output: args
            .get_one::<PathBuf>("output")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("dist")),
        clean: args.get_flag("clean"),
        dry_run: args.get_flag("dry-run"),
    };

    let tools = Toolchain::external(app.root(), sass, esbuild, transpile);

    api::build(app, &tools, &target)?;

    Ok(())
}

fn handle_config(app: &App) -> miette::Result<()> {
    print!("{}", api::render_config(app)?);

    Ok(())
}
