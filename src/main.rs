use std::process;

use clap::Parser;

use certsweep::remove::{self, Outcome};
use certsweep::store;

#[derive(Parser)]
#[command(name = "certsweep")]
#[command(about = "Removes a certificate with its private key and trust settings from the keychain", long_about = None)]
struct Cli {
    /// Certificate label, as it appears in the Keychain Access UI
    #[arg(value_name = "CERT_LABEL")]
    label: String,
}

fn main() {
    // Diagnostics go to stdout, usage errors included; anything but
    // exactly one label exits 1 before touching the store.
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        if err.use_stderr() {
            println!("Certificate label not provided as argument.\nUsage: certsweep <CERT_LABEL>");
            process::exit(1);
        }
        // --help / --version
        let _ = err.print();
        process::exit(0);
    });

    let store = store::open_default().unwrap_or_else(|err| {
        println!("Failed to open the credential store: {}", err);
        process::exit(1);
    });

    match remove::remove_certificate(&store, &cli.label) {
        // deleting a certificate that was never there counts as success
        Outcome::NotFound | Outcome::Removed => process::exit(0),
        Outcome::Failed => process::exit(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_label() {
        let cli = Cli::try_parse_from(["certsweep", "TestCert"]).unwrap();
        assert_eq!(cli.label, "TestCert");
    }

    #[test]
    fn rejects_missing_label() {
        assert!(Cli::try_parse_from(["certsweep"]).is_err());
    }

    #[test]
    fn rejects_extra_arguments() {
        assert!(Cli::try_parse_from(["certsweep", "TestCert", "extra"]).is_err());
    }
}
