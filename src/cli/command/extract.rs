use clap::Parser;
use derive_more::Deref;

use crate::{
    cli::command::{self, CommandExecutor},
    errors::RvError,
    extract::{list_secrets, Extractor},
    BUILD_TIME, VERSION,
};

#[derive(Parser, Deref)]
#[command(
    author,
    version,
    about = r#"Unseals the origin storage and reads the listed secrets without writing them
anywhere. Prints each secret path and the size of its value, never the value
itself. With --list, prints the decrypted key listing under the origin backend
name instead, which helps to find the paths to migrate.

Check that two secrets can be read:

  $ rvault-migrate extract --config=origin.hcl \
      --origin-vault-backend-name=logical/<uuid> \
      --origin-vault-keys-paths='app/db app/api'

List the keys stored under app/:

  $ rvault-migrate extract --config=origin.hcl \
      --origin-vault-backend-name=logical/<uuid> --list=app/"#
)]
pub struct Extract {
    #[deref]
    #[command(flatten, next_help_heading = "Origin Options")]
    origin: command::OriginOptions,

    #[arg(
        long,
        next_line_help = true,
        value_name = "prefix",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "List the keys under this prefix, relative to the origin backend name"
    )]
    list: Option<String>,
}

impl CommandExecutor for Extract {
    #[inline]
    fn main(&self) -> Result<(), RvError> {
        let config = self.load_config()?;
        command::init_logger(&self.log_level(&config));
        log::debug!("rvault-migrate {}, built at {}", VERSION, BUILD_TIME);

        if let Some(prefix) = &self.list {
            let unsealed = self.unseal(&config)?;
            for key in list_secrets(&unsealed, self.backend_name(), prefix)? {
                println!("{}", key);
            }
            return Ok(());
        }

        let request = self.request()?;
        let unsealed = self.unseal(&config)?;
        let secrets = Extractor::new(request).extract(&unsealed)?;

        for (path, value) in secrets.iter() {
            println!("{}\t{} bytes", path, value.len());
        }

        Ok(())
    }
}
