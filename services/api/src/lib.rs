mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use posting_fulfillment::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
