use crate::config::Config;
use crate::config::ConfigError;
use crate::config::LibraryConfig;

#[test]
fn test_build() -> anyhow::Result<()> {
    let config = Config::build(&[
        "fixgate",
        "--node-id=2",
        "--other-nodes=1,3",
        "--timeout-interval-ms=500",
    ])?;

    assert_eq!(2, config.node_id);
    assert_eq!(vec![1, 3], config.other_nodes);
    assert_eq!(500, config.timeout_interval_ms);
    assert_eq!(3, config.cluster_size());

    Ok(())
}

#[test]
fn test_max_fragment_bytes_with_unit() -> anyhow::Result<()> {
    let config = Config::build(&["fixgate", "--max-fragment-bytes=4 KiB"])?;
    assert_eq!(4096, config.max_fragment_bytes);

    Ok(())
}

#[test]
fn test_invalid_cluster_layout() {
    assert_eq!(
        Err(ConfigError::OtherNodesContainSelf { node_id: 1 }),
        Config::build(&["fixgate", "--node-id=1", "--other-nodes=1,2"])
    );

    assert_eq!(
        Err(ConfigError::DuplicateOtherNode { node_id: 2 }),
        Config::build(&["fixgate", "--node-id=1", "--other-nodes=2,2"])
    );

    assert_eq!(
        Err(ConfigError::NodeIdNotPositive { node_id: 0 }),
        Config::build(&["fixgate", "--node-id=0"])
    );

    assert_eq!(
        Err(ConfigError::TimeoutIntervalIsZero),
        Config::build(&["fixgate", "--timeout-interval-ms=0"])
    );
}

#[test]
fn test_library_config() -> anyhow::Result<()> {
    let config = LibraryConfig::build(&[
        "fixgate",
        "--library-id=7",
        "--engine-channels=aeron:udp?endpoint=engine-a,aeron:udp?endpoint=engine-b",
    ])?;

    assert_eq!(7, config.library_id);
    assert_eq!(2, config.engine_channels.len());

    assert_eq!(
        Err(ConfigError::NoEngineChannels),
        LibraryConfig::build(&["fixgate", "--library-id=7"])
    );

    Ok(())
}
