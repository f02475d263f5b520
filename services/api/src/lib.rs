mod assets;
mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use uw_engine::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
