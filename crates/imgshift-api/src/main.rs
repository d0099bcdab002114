use imgshift_core::Config;

// Use mimalloc as the global allocator for lower fragmentation under many
// short-lived decode buffers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (scratch storage, services, routes)
    let (_state, router) = imgshift_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    imgshift_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
