use clap::Parser;
use derive_more::Deref;

use crate::{
    cli::command::{self, CommandExecutor},
    errors::RvError,
    extract::Extractor,
    sink, BUILD_TIME, VERSION,
};

#[derive(Parser, Deref)]
#[command(
    author,
    version,
    about = r#"Moves secrets from the storage of a sealed origin Vault into a running destination
Vault. The origin master key is reconstructed from its key shares, the origin
barrier is unsealed, the listed secrets are decrypted and then written through
the destination's HTTP API. Nothing is written unless every secret was read.

Migrate the secret stored at logical/<uuid>/app/db to secret/app/db:

  $ rvault-migrate migrate --config=origin.hcl \
      --origin-vault-backend-name=logical/<uuid> \
      --origin-vault-keys-paths='app/db' \
      --destination-vault-address=https://127.0.0.1:8200 \
      --destination-vault-backend-name=secret/"#
)]
pub struct Migrate {
    #[deref]
    #[command(flatten, next_help_heading = "Origin Options")]
    origin: command::OriginOptions,

    #[command(flatten, next_help_heading = "Destination Options")]
    destination: command::DestinationOptions,
}

impl CommandExecutor for Migrate {
    #[inline]
    fn main(&self) -> Result<(), RvError> {
        let config = self.load_config()?;
        command::init_logger(&self.log_level(&config));
        log::debug!("rvault-migrate {}, built at {}", VERSION, BUILD_TIME);

        // settle every input before the barrier is touched
        let request = self.request()?;
        let sink = self.destination.sink()?;

        let unsealed = self.unseal(&config)?;
        let secrets = Extractor::new(request).extract(&unsealed)?;

        for path in secrets.keys() {
            println!("read key {}", path);
        }

        let count = sink::migrate(&secrets, &sink)?;
        println!("migrated {} secrets into {}", count, sink.backend_name());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use serde_json::{json, Value};

    use crate::{
        cli::Cli,
        storage::physical::inmem::InmemBackend,
        test_utils::{test_backend_dir, test_file_backend, test_seed_barrier, test_write_config, MockVaultServer},
        EXIT_CODE_OK,
    };

    fn migrate_args<'a>(config: &'a str, shares: &'a str, paths: &'a str, address: &'a str) -> Vec<&'a str> {
        vec![
            "rvault-migrate",
            "migrate",
            "--config",
            config,
            "--origin-vault-backend-name",
            "/logical",
            "--origin-vault-keys-paths",
            paths,
            "--origin-vault-master-key-shares",
            shares,
            "--destination-vault-address",
            address,
            "--destination-vault-backend-name",
            "secret",
            "--destination-vault-token",
            "s.token",
        ]
    }

    #[test]
    fn test_cli_migrate() {
        let dir = test_backend_dir("test_cli_migrate");
        let config = test_write_config(&dir);
        let shares = test_seed_barrier(
            test_file_backend(&dir),
            &[("logical/app/db", r#"{"password":"s3cret"}"#), ("logical/app/api", r#"{"key":"k"}"#)],
        );
        let shares = shares[1..4].join(" ");

        let server = MockVaultServer::start(vec![204, 204]);
        let address = server.address();

        let mut cli = Cli::try_parse_from(migrate_args(&config, &shares, "app/db /app/api", &address)).unwrap();
        assert_eq!(cli.run(), EXIT_CODE_OK);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].path, "/v1/secret/app/api");
        assert_eq!(requests[1].path, "/v1/secret/app/db");
        assert_eq!(requests[1].header("X-Vault-Token").unwrap(), "s.token");
        assert_eq!(serde_json::from_slice::<Value>(&requests[1].body).unwrap(), json!({"password": "s3cret"}));
    }

    #[test]
    fn test_cli_migrate_failures() {
        let dir = test_backend_dir("test_cli_migrate_failures");
        let config = test_write_config(&dir);
        let shares = test_seed_barrier(test_file_backend(&dir), &[("logical/app/db", r#"{"password":"s3cret"}"#)]);
        let quorum = shares[..3].join(" ");

        // nothing listens here, none of these runs may reach the destination
        let address = "http://127.0.0.1:9";

        // a missing secret
        let mut cli = Cli::try_parse_from(migrate_args(&config, &quorum, "app/db app/missing", address)).unwrap();
        assert_eq!(cli.run(), sysexits::ExitCode::NoInput);

        // below the threshold
        let mut cli = Cli::try_parse_from(migrate_args(&config, &shares[0], "app/db", address)).unwrap();
        assert_eq!(cli.run(), sysexits::ExitCode::NoPerm);

        // a share that is not base64
        let bad = format!("{} !!!", shares[0]);
        let mut cli = Cli::try_parse_from(migrate_args(&config, &bad, "app/db", address)).unwrap();
        assert_eq!(cli.run(), sysexits::ExitCode::DataErr);

        // no paths
        let mut cli = Cli::try_parse_from(migrate_args(&config, &quorum, " ", address)).unwrap();
        assert_eq!(cli.run(), sysexits::ExitCode::Config);

        // the destination is down
        let mut cli = Cli::try_parse_from(migrate_args(&config, &quorum, "app/db", address)).unwrap();
        assert_eq!(cli.run(), sysexits::ExitCode::Unavailable);
    }

    #[test]
    fn test_cli_migrate_inmem_origin_is_empty() {
        // an inmem origin is never initialized
        let dir = test_backend_dir("test_cli_migrate_inmem");
        let config = format!("{}.json", dir);
        assert!(std::fs::write(&config, r#"{"storage": {"inmem": {}}}"#).is_ok());

        let shares = test_seed_barrier(std::sync::Arc::new(InmemBackend::new()), &[]);
        let quorum = shares[..3].join(" ");

        let mut cli = Cli::try_parse_from(migrate_args(&config, &quorum, "app/db", "http://127.0.0.1:9")).unwrap();
        assert_eq!(cli.run(), sysexits::ExitCode::NoPerm);
    }
}
