use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "coin-tally")]
#[command(version, about = "Count coins in a photo by fitted-ellipse size and sum their value")]
pub struct Cli {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Annotated image path [default: input_detected.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show detection details
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self.input.file_stem().unwrap_or_default().to_string_lossy();
            let parent = self.input.parent().unwrap_or(std::path::Path::new("."));
            parent.join(format!("{}_detected.png", stem))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let cli = Cli {
            input: PathBuf::from("/photos/coins.jpg"),
            output: None,
            verbose: false,
        };
        assert_eq!(cli.output_path(), PathBuf::from("/photos/coins_detected.png"));
    }

    #[test]
    fn test_explicit_output_path() {
        let cli = Cli {
            input: PathBuf::from("coins.jpg"),
            output: Some(PathBuf::from("out.png")),
            verbose: false,
        };
        assert_eq!(cli.output_path(), PathBuf::from("out.png"));
    }

    #[test]
    fn test_rejects_missing_input() {
        assert!(Cli::try_parse_from(["coin-tally"]).is_err());
    }

    #[test]
    fn test_rejects_extra_positionals() {
        assert!(Cli::try_parse_from(["coin-tally", "a.jpg", "b.jpg"]).is_err());
    }
}
