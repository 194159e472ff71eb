use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: percload [OPTIONS]

Options:
  --participant ID   Participant identifier written to every row (default: anonymous)
  --session ID       Session identifier (default: 1)
  --config PATH      JSON configuration file; missing fields use defaults
  --seed N           RNG seed, overrides the configuration
  --output DIR       Directory for result files, overrides the configuration
  --simulate         Run headless with a simulated participant
  --fast             With --simulate, skip real waiting
  --accuracy P       With --simulate, probability of a correct answer (default: 0.9)
  --help, -h         Show this help message";

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub participant: String,
    pub session: String,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub output: Option<PathBuf>,
    pub simulate: bool,
    pub fast: bool,
    pub accuracy: f64,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            participant: "anonymous".into(),
            session: "1".into(),
            config: None,
            seed: None,
            output: None,
            simulate: false,
            fast: false,
            accuracy: 0.9,
        }
    }
}

fn value<I: Iterator<Item = String>>(argv: &mut I, flag: &str) -> Result<String, String> {
    argv.next()
        .filter(|v| !v.starts_with("--"))
        .ok_or_else(|| format!("{flag} requires a value"))
}

/// `Ok(None)` means help was requested.
pub fn parse_args<I: IntoIterator<Item = String>>(argv: I) -> Result<Option<Args>, String> {
    let mut args = Args::default();
    let mut argv = argv.into_iter();

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--participant" => args.participant = value(&mut argv, &arg)?,
            "--session" => args.session = value(&mut argv, &arg)?,
            "--config" => args.config = Some(PathBuf::from(value(&mut argv, &arg)?)),
            "--output" => args.output = Some(PathBuf::from(value(&mut argv, &arg)?)),
            "--seed" => {
                let raw = value(&mut argv, &arg)?;
                args.seed = Some(
                    raw.parse()
                        .map_err(|_| format!("Invalid --seed value: {raw}"))?,
                );
            }
            "--accuracy" => {
                let raw = value(&mut argv, &arg)?;
                args.accuracy = raw
                    .parse()
                    .ok()
                    .filter(|p: &f64| (0.0..=1.0).contains(p))
                    .ok_or_else(|| format!("Invalid --accuracy value: {raw}"))?;
            }
            "--simulate" => args.simulate = true,
            "--fast" => args.fast = true,
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    if args.participant.trim().is_empty() {
        return Err("--participant must not be empty".into());
    }
    Ok(Some(args))
}
