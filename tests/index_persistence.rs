//! 帧索引持久化集成测试.
//!
//! 扫描得到的索引可以序列化保存, 下次打开同一文件时导入, 省去重新扫描.

mod common;

use std::fs;

use common::{L2_STEREO_44K, SPF, frame_size, layer2_stream, read_all};
use yin::format::IndexSnapshot;
use yin::{Decoder, DecoderParams, Whence, YinError};

#[test]
fn test_折叠索引导出导入() {
    let data = layer2_stream(L2_STEREO_44K, 40);
    let size = frame_size(L2_STEREO_44K) as i64;

    let params = DecoderParams {
        index_size: 8,
        ..DecoderParams::default()
    };
    let mut scanned = Decoder::with_params(params).unwrap();
    scanned.open_memory(data.clone()).unwrap();
    assert_eq!(scanned.scan().unwrap(), 40 * SPF);
    let snapshot = scanned.index();
    assert_eq!(snapshot.step, 8);
    assert_eq!(snapshot.fill, 5);
    let expected: Vec<i64> = (0..5).map(|i| i * 8 * size).collect();
    assert_eq!(snapshot.offsets, expected);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("track.index.json");
    fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    let mut full_dec = Decoder::new();
    full_dec.open_memory(data.clone()).unwrap();
    let full = read_all(&mut full_dec);

    let restored: IndexSnapshot = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(restored, snapshot);
    let mut dec = Decoder::new();
    dec.open_memory(data).unwrap();
    dec.set_index(&restored).unwrap();
    assert_eq!(dec.index(), snapshot);

    let target = 30 * SPF + 100;
    assert_eq!(dec.seek(target, Whence::Set).unwrap(), target);
    let tail = read_all(&mut dec);
    assert!(tail == full[target as usize * 4..]);
}

#[test]
fn test_索引格式() {
    let mut dec = Decoder::new();
    dec.open_memory(layer2_stream(L2_STEREO_44K, 3)).unwrap();
    dec.scan().unwrap();
    let value = serde_json::to_value(dec.index()).unwrap();
    assert_eq!(
        value,
        serde_json::json!({ "offsets": [0, 417, 834], "step": 1, "fill": 3 })
    );
}

#[test]
fn test_无效索引被拒绝() {
    let mut dec = Decoder::new();
    dec.open_memory(layer2_stream(L2_STEREO_44K, 3)).unwrap();
    dec.scan().unwrap();
    let before = dec.index();

    let bad: IndexSnapshot =
        serde_json::from_str(r#"{"offsets":[0,834,417],"step":1,"fill":3}"#).unwrap();
    assert!(matches!(dec.set_index(&bad), Err(YinError::BadIndexParam(_))));
    let bad: IndexSnapshot =
        serde_json::from_str(r#"{"offsets":[0,417],"step":1,"fill":5}"#).unwrap();
    assert!(matches!(dec.set_index(&bad), Err(YinError::BadIndexParam(_))));
    // 失败的导入不改动现有索引
    assert_eq!(dec.index(), before);
}

#[test]
fn test_参数从配置文件读取() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decoder.json");
    fs::write(
        &path,
        r#"{"encoding":"s32","index_size":-16,"preframes":2,"resync_limit":-1}"#,
    )
    .unwrap();
    let params: DecoderParams = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(params.index_layout(), (16, 16));

    let mut dec = Decoder::with_params(params).unwrap();
    dec.open_memory(layer2_stream(L2_STEREO_44K, 20)).unwrap();
    dec.scan().unwrap();
    // 扩容而不折叠
    let index = dec.index();
    assert_eq!((index.step, index.fill), (1, 20));
    assert_eq!(read_all(&mut dec).len(), 20 * SPF as usize * 2 * 4);
}
