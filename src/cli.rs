use crate::errors::{AppError, Result};
use clap::Parser;
use clap::error::ErrorKind;

#[derive(Debug, Clone, Parser)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct CliArgs {
    #[arg(short = 'p', long = "input1")]
    input1: Option<String>,
    #[arg(short = 'o', long = "output1")]
    output1: Option<String>,
    #[arg(short = 'R', long = "ref")]
    reference: Option<String>,
    #[arg(short = 'n', long = "ownFile")]
    own_file: Option<String>,
    #[arg(short = 'b', long = "bamIndex")]
    bam_index: Option<String>,
    #[arg(short = 'g', long = "index")]
    index: Option<String>,
    #[arg(short = 's', long = "lastCol", default_value = "no")]
    last_col: String,
    #[arg(short = 'i', long = "indels", default_value = "no")]
    indels: String,
    #[arg(short = 'M', long = "mapCap")]
    map_cap: Option<String>,
    #[arg(short = 'c', long = "consensus", default_value = "no")]
    consensus: String,
    #[arg(short = 'T', long = "theta")]
    theta: Option<String>,
    #[arg(short = 'N', long = "hapNum")]
    hap_num: Option<String>,
    #[arg(short = 'r', long = "fraction")]
    fraction: Option<String>,
    #[arg(short = 'I', long = "phredProb")]
    phred_prob: Option<String>,
    #[arg(short = 'S', long = "samtools", default_value = "samtools")]
    samtools: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceMode {
    Indexed,
    History,
}

impl ReferenceMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "indexed" => Ok(Self::Indexed),
            "history" => Ok(Self::History),
            other => Err(AppError::InvalidValue {
                flag: "--ref".to_string(),
                value: other.to_string(),
                reason: "supported reference modes are only \"indexed\" and \"history\""
                    .to_string(),
            }),
        }
    }
}

/// Parameters for the MAQ consensus model, all required together.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusParams {
    pub theta: f64,
    pub hap_num: i64,
    pub fraction: f64,
    pub phred_prob: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamPileupArgs {
    pub input1: String,
    pub output1: String,
    pub ref_mode: ReferenceMode,
    pub own_file: Option<String>,
    pub bam_index: String,
    pub index: Option<String>,
    pub last_col: bool,
    pub indels: bool,
    pub map_cap: i64,
    pub consensus: Option<ConsensusParams>,
    pub samtools: String,
}

impl SamPileupArgs {
    pub fn validate(&self) -> Result<()> {
        if self.input1.is_empty() {
            return Err(AppError::MissingRequired {
                field: "--input1".to_string(),
            });
        }
        if self.output1.is_empty() {
            return Err(AppError::MissingRequired {
                field: "--output1".to_string(),
            });
        }
        if self.bam_index.is_empty() {
            return Err(AppError::MissingRequired {
                field: "--bamIndex".to_string(),
            });
        }
        if self.ref_mode == ReferenceMode::History && self.own_file.is_none() {
            return Err(AppError::MissingRequired {
                field: "--ownFile (required when --ref is history)".to_string(),
            });
        }
        if self.ref_mode == ReferenceMode::Indexed && self.index.is_none() {
            return Err(AppError::MissingRequired {
                field: "--index (required when --ref is indexed)".to_string(),
            });
        }
        Ok(())
    }
}

pub fn parse_from_env() -> Result<SamPileupArgs> {
    parse_args(std::env::args())
}

pub fn parse_args<I, S>(args: I) -> Result<SamPileupArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tokens: Vec<String> = args.into_iter().map(Into::into).collect();
    if tokens.is_empty() {
        tokens.push("sam_pileup".to_string());
    }

    let cli = CliArgs::try_parse_from(tokens).map_err(map_clap_error)?;

    let ref_value = cli.reference.ok_or_else(|| AppError::MissingRequired {
        field: "--ref".to_string(),
    })?;

    let consensus = if cli.consensus == "yes" {
        Some(ConsensusParams {
            theta: parse_f64("--theta", &required(cli.theta, "--theta")?)?,
            hap_num: parse_i64("--hapNum", &required(cli.hap_num, "--hapNum")?)?,
            fraction: parse_f64("--fraction", &required(cli.fraction, "--fraction")?)?,
            phred_prob: parse_f64("--phredProb", &required(cli.phred_prob, "--phredProb")?)?,
        })
    } else {
        None
    };

    let parsed = SamPileupArgs {
        input1: cli.input1.unwrap_or_default(),
        output1: cli.output1.unwrap_or_default(),
        ref_mode: ReferenceMode::parse(&ref_value)?,
        own_file: cli.own_file,
        bam_index: cli.bam_index.unwrap_or_default(),
        index: cli.index,
        last_col: cli.last_col == "yes",
        indels: cli.indels == "yes",
        map_cap: parse_i64(
            "--mapCap",
            &required(cli.map_cap, "--mapCap (required when converting to pileup)")?,
        )?,
        consensus,
        samtools: cli.samtools,
    };

    parsed.validate()?;
    Ok(parsed)
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value.ok_or_else(|| AppError::MissingRequired {
        field: field.to_string(),
    })
}

fn map_clap_error(error: clap::Error) -> AppError {
    let kind = error.kind();
    let rendered = error.to_string();
    match kind {
        ErrorKind::UnknownArgument => AppError::UnsupportedArgument {
            arg: first_quoted_token(&rendered).unwrap_or(rendered),
        },
        ErrorKind::TooFewValues | ErrorKind::WrongNumberOfValues => AppError::MissingValue {
            flag: first_quoted_token(&rendered).unwrap_or_else(|| "argument".to_string()),
        },
        _ => AppError::ParseError {
            message: clap_error_message(&rendered),
        },
    }
}

fn first_quoted_token(message: &str) -> Option<String> {
    let start = message.find('\'')?;
    let end = message[start + 1..].find('\'')?;
    Some(message[start + 1..start + 1 + end].to_string())
}

fn clap_error_message(message: &str) -> String {
    message
        .lines()
        .find_map(|line| line.strip_prefix("error: "))
        .or_else(|| message.lines().next())
        .unwrap_or("failed to parse arguments")
        .to_string()
}

fn parse_i64(flag: &str, value: &str) -> Result<i64> {
    value.parse::<i64>().map_err(|_| AppError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        reason: "must be an integer".to_string(),
    })
}

fn parse_f64(flag: &str, value: &str) -> Result<f64> {
    value.parse::<f64>().map_err(|_| AppError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
        reason: "must be a floating-point number".to_string(),
    })
}
