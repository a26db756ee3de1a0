use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A .env file is a convenience for local runs; deployments inject the
    // environment directly, so a missing file is not an error.
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err.into());
        }
    }

    api::start().await?;

    Ok(())
}
