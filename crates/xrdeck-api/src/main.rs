use xrdeck_core::Config;

// Use mimalloc as the global allocator: archives are decompressed into many
// short-lived buffers, which fragments the system allocator under musl.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (_state, router) = xrdeck_api::setup::initialize_app(config.clone()).await?;

    xrdeck_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
