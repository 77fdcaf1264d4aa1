use common::config::Config;
use common::etherscan::EtherscanClient;
use common::solscan::SolscanClient;

fn default_config() -> Config {
    Config::from_toml_str(include_str!("../../../config/default.toml")).unwrap()
}

#[tokio::test]
#[ignore] // requires network
async fn test_fetch_real_listing_page_parses() {
    let config = default_config();
    let client = EtherscanClient::new(&config.etherscan, &config.http).unwrap();
    let page = client
        .fetch_listing_page("0xdAC17F958D2ee523a2206206994597C13D831ec7", 1)
        .await
        .unwrap();
    assert!(page.rows.is_some());
}

#[tokio::test]
#[ignore] // requires network
async fn test_fetch_real_transaction_page_parses() {
    let config = default_config();
    let client = SolscanClient::new(&config.solscan, &config.http).unwrap();
    let page = client
        .fetch_transaction_page("Vote111111111111111111111111111111111111111", 10, None)
        .await
        .unwrap();
    assert!(page.success);
}
