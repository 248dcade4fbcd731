use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use delegate_relay::crypto::to_hex;
use delegate_relay::eip7702::{authorization_payload, AUTHORIZATION_MAGIC};
use delegate_relay::tx::PreparedSummary;
use delegate_relay::utils::{logging, sanitize};
use delegate_relay::{
    authorization_digest, build_authorization, decode_signed_envelope, log_error, log_info, to_checksum_address,
    AuthorizationTuple, DelegatedRelay, ErrorBody, ErrorCode, FeeData, PrivateKey, RelayConfig,
    RelayError, RelayRequest, RetryingProvider, RpcBroadcaster, RpcProvider, SignedAuthorization,
    StaticProvider,
};
use ethers_core::types::{Address, Bytes, U256};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "delegate-relay", version, about = "EIP-7702 delegated transaction relay")]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the authorization digest an authority signs
    AuthDigest(AuthorizationArgs),

    /// Sign an authorization with the authority key
    SignAuthorization {
        #[command(flatten)]
        auth: AuthorizationArgs,

        #[command(flatten)]
        authority: AuthorityKeyArgs,

        /// Address the signature must recover to (defaults to the key's address)
        #[arg(long, value_parser = parse_address)]
        expected_authority: Option<Address>,
    },

    /// Build and sign a complete envelope from explicit chain state
    Build(BuildArgs),

    /// Decode a signed payload and recover its signers
    Decode {
        /// 0x-prefixed signed payload
        #[arg(long)]
        raw: String,
    },

    /// Fetch chain state, sign and broadcast
    Send(SendArgs),
}

#[derive(Args)]
struct AuthorizationArgs {
    #[arg(long, value_parser = parse_quantity)]
    chain_id: U256,

    #[arg(long, value_parser = parse_address)]
    delegate: Address,

    #[arg(long, value_parser = parse_u64, default_value = "0")]
    nonce: u64,
}

#[derive(Args)]
struct AuthorityKeyArgs {
    /// Authority private key (hex)
    #[arg(long, env = "AUTHORITY_PRIVATE_KEY", hide_env_values = true)]
    authority_key: String,
}

#[derive(Args)]
struct KeyArgs {
    #[command(flatten)]
    authority: AuthorityKeyArgs,

    /// Relay private key (hex)
    #[arg(long, env = "RELAY_PRIVATE_KEY", hide_env_values = true)]
    relay_key: String,
}

#[derive(Args)]
struct CallArgs {
    #[arg(long, value_parser = parse_address)]
    delegate: Address,

    /// Call target, defaults to the authority account
    #[arg(long, value_parser = parse_address)]
    to: Option<Address>,

    #[arg(long, value_parser = parse_quantity, default_value = "0")]
    value: U256,

    /// 0x-prefixed call data
    #[arg(long, value_parser = parse_hex, default_value = "0x")]
    data: Bytes,

    #[arg(long, value_parser = parse_quantity)]
    gas_limit: Option<U256>,
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    keys: KeyArgs,

    #[command(flatten)]
    call: CallArgs,

    #[arg(long, value_parser = parse_quantity)]
    chain_id: U256,

    #[arg(long, value_parser = parse_u64)]
    authority_nonce: u64,

    #[arg(long, value_parser = parse_u64)]
    relay_nonce: u64,

    /// Omitted fees are encoded as empty
    #[arg(long, value_parser = parse_quantity)]
    max_fee_per_gas: Option<U256>,

    #[arg(long, value_parser = parse_quantity)]
    max_priority_fee_per_gas: Option<U256>,
}

#[derive(Args)]
struct SendArgs {
    #[command(flatten)]
    keys: KeyArgs,

    #[command(flatten)]
    call: CallArgs,

    /// JSON configuration file
    #[arg(long)]
    config: PathBuf,

    /// Wait for the receipt after broadcasting
    #[arg(long)]
    wait: bool,
}

fn parse_address(s: &str) -> Result<Address, String> {
    sanitize::parse_address(s).map_err(|e| e.to_string())
}

fn parse_quantity(s: &str) -> Result<U256, String> {
    sanitize::parse_quantity(s).map_err(|e| e.to_string())
}

fn parse_u64(s: &str) -> Result<u64, String> {
    sanitize::parse_u64(s).map_err(|e| e.to_string())
}

fn parse_hex(s: &str) -> Result<Bytes, String> {
    sanitize::validate_hex(s, None)
        .map(Bytes::from)
        .map_err(|e| e.to_string())
}

/// Move a key string into a zeroizing secret and parse it
fn load_key(raw: String) -> Result<PrivateKey, RelayError> {
    let secret = SecretString::from(raw);
    PrivateKey::from_hex(secret.expose_secret())
}

impl CallArgs {
    fn request<'a>(&self, authority: &'a PrivateKey, relay: &'a PrivateKey) -> RelayRequest<'a> {
        RelayRequest {
            authority_key: authority,
            relay_key: relay,
            delegate: self.delegate,
            to: self.to,
            value: self.value,
            data: self.data.to_vec(),
            gas_limit: self.gas_limit,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecodedAuthorization {
    #[serde(flatten)]
    authorization: SignedAuthorization,
    authority: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecodedEnvelope {
    hash: String,
    sender: String,
    chain_id: U256,
    nonce: u64,
    max_priority_fee_per_gas: Option<U256>,
    max_fee_per_gas: Option<U256>,
    gas_limit: U256,
    to: String,
    value: U256,
    data: String,
    access_list: serde_json::Value,
    authorization_list: Vec<DecodedAuthorization>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::AuthDigest(args) => {
            let tuple = AuthorizationTuple::new(args.chain_id, args.delegate, args.nonce);
            let mut message = vec![AUTHORIZATION_MAGIC];
            message.extend(authorization_payload(&tuple));

            print_json(&json!({
                "message": to_hex(&message),
                "digest": to_hex(&authorization_digest(&tuple)),
            }))
        }

        Command::SignAuthorization {
            auth,
            authority,
            expected_authority,
        } => {
            let key = load_key(authority.authority_key)?;
            let expected = match expected_authority {
                Some(address) => address,
                None => key.address()?,
            };
            let signed = build_authorization(auth.chain_id, auth.delegate, auth.nonce, &key, expected)?;

            print_json(&DecodedAuthorization {
                authority: to_checksum_address(&expected),
                authorization: signed,
            })
        }

        Command::Build(args) => {
            let authority = load_key(args.keys.authority.authority_key)?;
            let relay = load_key(args.keys.relay_key)?;

            let gas_limit = args
                .call
                .gas_limit
                .ok_or_else(|| RelayError::validation("--gas-limit is required for offline builds"))?;

            let provider = StaticProvider::new(args.chain_id)
                .with_nonce(authority.address()?, args.authority_nonce)
                .with_nonce(relay.address()?, args.relay_nonce)
                .with_fees(FeeData {
                    max_fee_per_gas: args.max_fee_per_gas,
                    max_priority_fee_per_gas: args.max_priority_fee_per_gas,
                })
                .with_gas_estimate(gas_limit);

            let pipeline = DelegatedRelay::new(RelayConfig::default(), provider, ());
            let prepared = pipeline.prepare(&args.call.request(&authority, &relay))?;
            let summary: PreparedSummary = prepared.summary();
            print_json(&summary)
        }

        Command::Decode { raw } => {
            let bytes = sanitize::validate_hex(&raw, None)?;
            let envelope = decode_signed_envelope(&bytes)?;
            let fields = envelope.fields();

            let authorization_list = fields
                .authorization_list
                .iter()
                .map(|auth| {
                    Ok(DecodedAuthorization {
                        authority: to_checksum_address(&auth.recover_authority()?),
                        authorization: auth.clone(),
                    })
                })
                .collect::<Result<Vec<_>, RelayError>>()?;

            print_json(&DecodedEnvelope {
                hash: to_hex(&envelope.transaction_hash()),
                sender: to_checksum_address(&envelope.recover_sender()?),
                chain_id: fields.chain_id,
                nonce: fields.nonce,
                max_priority_fee_per_gas: fields.max_priority_fee_per_gas,
                max_fee_per_gas: fields.max_fee_per_gas,
                gas_limit: fields.gas_limit,
                to: to_checksum_address(&fields.to),
                value: fields.value,
                data: to_hex(&fields.data),
                access_list: serde_json::to_value(&fields.access_list)?,
                authorization_list,
            })
        }

        Command::Send(args) => {
            let config = RelayConfig::from_json_file(&args.config)
                .with_context(|| format!("loading {}", args.config.display()))?;
            let authority = load_key(args.keys.authority.authority_key)?;
            let relay = load_key(args.keys.relay_key)?;

            let provider = RetryingProvider::new(RpcProvider::new(&config)?, config.retry);
            let broadcaster = RpcBroadcaster::new(&config)?;
            let pipeline = DelegatedRelay::new(config, provider, broadcaster);

            let outcome = pipeline.send(&args.call.request(&authority, &relay))?;
            log_info!("main", "Submitted", tx_hash = outcome.tx_hash);

            if args.wait {
                let receipt = pipeline.broadcaster().wait_for_receipt(&outcome.tx_hash)?;
                print_json(&json!({ "txHash": outcome.tx_hash, "receipt": receipt }))
            } else {
                print_json(&json!({ "txHash": outcome.tx_hash }))
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::set_debug(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let body = match e.downcast_ref::<RelayError>() {
                Some(relay_error) => ErrorBody::from(relay_error),
                None => ErrorBody {
                    code: ErrorCode::ConfigError,
                    message: format!("{:#}", e),
                },
            };
            log_error!("main", "Command failed", error = body.message);
            println!("{}", json!({ "error": body }));
            ExitCode::FAILURE
        }
    }
}
