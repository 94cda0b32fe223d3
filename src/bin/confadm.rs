//! confadm entry point: admin operations on the configuration service.

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use confclient::{
    admin::AdminClient,
    cli::{AdminArgs, AdminCommand},
    error::{default_error_handler, Error},
    http::{Scope, Transport},
    logger::init_logger,
};
use log::debug;

fn main() {
    let args = AdminArgs::parse();
    init_logger(args.log_level, args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

fn read_stdin() -> anyhow::Result<String> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer).context("cannot read stdin")?;
    Ok(buffer)
}

fn run(args: AdminArgs) -> anyhow::Result<()> {
    let mut scope = Scope::from_env();
    for (name, value) in &args.scope {
        scope.insert(name.clone(), value.clone());
    }
    let transport = Transport::new(&args.url, &scope, Duration::from_secs(args.timeout))?;
    let client = AdminClient::new(transport);

    match args.command {
        AdminCommand::Get { key } => {
            let document = client.get_key_json(&key)?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        AdminCommand::Gett { key } => println!("{}", client.get_key_text(&key)?),
        AdminCommand::Geta { partial } => {
            for key in client.list_keys(&format!("*:{partial}"))? {
                println!("Key: {key}");
                println!("{}", client.get_key_text(&key)?);
            }
        }
        AdminCommand::Set { key, value: Some(value) } => client.set_string(&key, &value)?,
        AdminCommand::Set { key, value: None } => client.set_key_from_json(&key, &read_stdin()?)?,
        AdminCommand::Del { key } => client.delete_key(&key)?,
        AdminCommand::List { filter } => {
            for key in client.list_keys(filter.as_deref().unwrap_or_default())? {
                println!("{key}");
            }
        }
        AdminCommand::Related { key } => {
            let last = key.rsplit(':').next().unwrap_or(&key);
            for related in client.list_keys(&format!("*:{last}"))? {
                println!("{related}");
            }
        }
        AdminCommand::Type { key } => println!("{}", client.key_type(&key)?),
        AdminCommand::Hget { key, field } => println!("{}", client.get_hash_field(&key, &field)?),
        AdminCommand::Hset { key, field, value } => client.set_hash_field(&key, &field, &value)?,
        AdminCommand::Hgeta { partial, field } => {
            let mut found = BTreeMap::new();
            for key in client.list_keys(&format!("*:{partial}"))? {
                match client.get_hash_field(&key, &field) {
                    Ok(value) => {
                        found.insert(key, value);
                    }
                    Err(Error::NotFound { .. }) => debug!("{} has no field {}", key, field),
                    Err(err) => {
                        return Err(err).with_context(|| format!("cannot get key {key} field {field}"))
                    }
                }
            }
            let width = found.keys().map(String::len).max().unwrap_or(0) + 5;
            for (key, value) in found {
                println!("{key:<width$}{value}");
            }
        }
        AdminCommand::Hlist { key } => {
            for field in client.list_hash_fields(&key)? {
                println!("{field}");
            }
        }
        AdminCommand::Lget { key, index } => println!("{}", client.get_list_index(&key, index)?),
        AdminCommand::Lpush { key, value } => client.list_append(&key, &value)?,
        AdminCommand::Dump { output } => {
            let written = client.dump_keys(&output)?;
            println!("Dumped {} keys to {}", written, output.display());
        }
    }
    Ok(())
}
