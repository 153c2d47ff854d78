use archive_model::{ArchiveStream, ArchiveStreamType};
use archive_stitcher::Stitcher;
use archive_storage::{LocalBackend, StoragePool};
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

fn mock_tool_path(name: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn stitches_two_streams_into_mp4_and_mp3() {
    let dir = tempfile::tempdir().unwrap();
    let remote = StoragePool::new(Arc::new(LocalBackend::new(dir.path())), 4);

    {
        let handle = remote.acquire().await.unwrap();
        handle.save("archive/2A-a.mp3", b"raw-a".to_vec()).await.unwrap();
        handle.save("archive/2A-b.mp3", b"raw-b".to_vec()).await.unwrap();
    }

    let work_dir = tempfile::tempdir().unwrap();
    let work = StoragePool::new(Arc::new(LocalBackend::new(work_dir.path())), 4);
    let stitcher = Stitcher::new(mock_tool_path("mock_ffmpeg.sh"), mock_tool_path("mock_sox.sh"), work);

    let streams = vec![
        ArchiveStream::new("archive/2A-a.mp3", ArchiveStreamType::UserAudio)
            .with_users([11])
            .with_offset_ms(0),
        ArchiveStream::new("archive/2A-b.mp3", ArchiveStreamType::UserAudio)
            .with_users([12])
            .with_offset_ms(500),
    ];

    let [mp4_stream, mp3_stream] = stitcher.stitch(&remote, &streams, "archive/2A").await.unwrap();

    assert_eq!(mp3_stream.filename, "archive/2A.mp3");
    assert_eq!(mp3_stream.stream_type, ArchiveStreamType::StitchedAudio);
    assert_eq!(mp3_stream.length_ms, Some(2000));
    assert_eq!(mp3_stream.offset_ms, 0);
    assert_eq!(mp3_stream.users, [11, 12].into_iter().collect());

    assert_eq!(mp4_stream.filename, "archive/2A.mp4");
    assert_eq!(mp4_stream.stream_type, ArchiveStreamType::StitchedAudio);
    assert_eq!(mp4_stream.length_ms, Some(2000));

    let handle = remote.acquire().await.unwrap();
    assert!(handle.exists("archive/2A.mp3").await.unwrap());
    assert!(handle.exists("archive/2A.mp4").await.unwrap());
}
