use std::process;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use serde_json::json;

use pkgmetadata_rs::{MetaDataXML, ParseLimits};

fn main() {
    let app = create_app();
    let matches = app.get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let code = match run_pkgmeta(&matches) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("pkgmeta: {:#}", e);
            1
        }
    };
    process::exit(code);
}

fn create_app() -> Command {
    Command::new("pkgmeta")
        .version("0.1.0")
        .about("Display the contents of a package's metadata.xml")
        .arg(
            Arg::new("description")
                .long("description")
                .short('d')
                .help("Show the long descriptions")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("maintainer")
                .long("maintainer")
                .short('m')
                .help("Show the package maintainers")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("use")
                .long("use")
                .short('u')
                .help("Show USE flag descriptions")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("upstream")
                .long("upstream")
                .short('U')
                .help("Show upstream contact information")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the selected sections as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max_size")
                .long("max-size")
                .help("Refuse files larger than this many bytes")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Verbose output")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("path")
                .help("Path to a metadata.xml file")
                .required(true),
        )
}

struct Sections {
    description: bool,
    maintainer: bool,
    use_flags: bool,
    upstream: bool,
}

fn run_pkgmeta(matches: &ArgMatches) -> Result<()> {
    let path = matches
        .get_one::<String>("path")
        .context("no metadata.xml path given")?;

    let mut limits = ParseLimits::default();
    if let Some(max) = matches.get_one::<u64>("max_size") {
        limits.max_bytes = *max;
    }

    let md = MetaDataXML::with_limits(path, limits)
        .with_context(|| format!("failed to load {}", path))?;

    let mut sections = Sections {
        description: matches.get_flag("description"),
        maintainer: matches.get_flag("maintainer"),
        use_flags: matches.get_flag("use"),
        upstream: matches.get_flag("upstream"),
    };
    if !(sections.description || sections.maintainer || sections.use_flags || sections.upstream) {
        sections = Sections {
            description: true,
            maintainer: true,
            use_flags: true,
            upstream: true,
        };
    }

    if matches.get_flag("json") {
        print_json(&md, &sections)
    } else {
        print_text(&md, &sections);
        Ok(())
    }
}

fn print_json(md: &MetaDataXML, sections: &Sections) -> Result<()> {
    let mut out = serde_json::Map::new();
    if sections.description {
        out.insert("descriptions".to_string(), json!(md.descriptions()));
    }
    if sections.maintainer {
        out.insert("maintainers".to_string(), json!(md.maintainers()));
    }
    if sections.use_flags {
        out.insert("use".to_string(), json!(md.use_flags()));
    }
    if sections.upstream {
        out.insert("upstream".to_string(), json!(md.upstream()));
    }

    let rendered = serde_json::to_string_pretty(&out).context("failed to encode metadata as JSON")?;
    println!("{}", rendered);
    Ok(())
}

fn print_text(md: &MetaDataXML, sections: &Sections) {
    if sections.description {
        for desc in md.descriptions() {
            if let Some(text) = &desc.text {
                println!("Description: {}", text.split_whitespace().collect::<Vec<_>>().join(" "));
            }
        }
    }

    if sections.maintainer {
        if md.maintainers().is_empty() {
            println!("Maintainer:  [none]");
        }
        for maint in md.maintainers() {
            println!("Maintainer:  {}", maint);
            if let Some(desc) = maint.description() {
                println!("             ({})", desc);
            }
            if let Some(restrict) = maint.restrict() {
                println!("             restricted to {}", restrict);
            }
        }
    }

    if sections.use_flags {
        for flag in md.use_flags() {
            match &flag.restrict {
                Some(restrict) => println!("USE flag:    {} [{}]", flag, restrict),
                None => println!("USE flag:    {}", flag),
            }
        }
    }

    if sections.upstream {
        for up in md.upstream() {
            for maint in &up.maintainers {
                match maint.status() {
                    Some(status) => println!("Upstream:    {} [{}]", maint, status),
                    None => println!("Upstream:    {}", maint),
                }
            }
            for changelog in &up.changelogs {
                println!("ChangeLog:   {}", changelog);
            }
            for doc in &up.docs {
                match &doc.lang {
                    Some(lang) => println!("Docs:        {} ({})", doc.url, lang),
                    None => println!("Docs:        {}", doc.url),
                }
            }
            for bugs in &up.bugtrackers {
                println!("Bugs-to:     {}", bugs);
            }
            for remote in &up.remoteids {
                println!("Remote-ID:   {} ({})", remote.id, remote.site.as_deref().unwrap_or("unknown"));
            }
        }
    }
}
