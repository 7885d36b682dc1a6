/*!
 * Syscall Client Tests
 * Correlation of replies to calls, driven by a hand-written kernel side
 */

use pretty_assertions::assert_eq;
use relay_kernel::core::id::CallIdGenerator;
use relay_kernel::ipc::{channel, KernelEndpoint, ToKernel, WireFormat};
use relay_kernel::syscalls::client::{ClientConfig, SyscallClient};
use relay_kernel::syscalls::types::{
    Errno, FileInfo, ReplyError, ReplyObject, SyscallError, SyscallOp, SyscallReply,
    SyscallRequest,
};

fn client_pair(format: WireFormat) -> (KernelEndpoint, SyscallClient) {
    let (kernel, process) = channel(format);
    let client = SyscallClient::new(
        1,
        CallIdGenerator::default_start(),
        process.sender(),
        ClientConfig::default(),
    );
    (kernel, client)
}

async fn next_request(kernel: &KernelEndpoint) -> SyscallRequest {
    match kernel.recv().await {
        Some(ToKernel::Syscall(request)) => request,
        other => panic!("expected a syscall request, got {:?}", other),
    }
}

fn stat_reply(id: u64, info: FileInfo) -> SyscallReply {
    SyscallReply::success(id, 0).with_object(ReplyObject::FileInfo(info))
}

#[tokio::test]
async fn test_out_of_order_replies_reach_their_calls() {
    let (kernel, client) = client_pair(WireFormat::Bincode);

    let calls = async { tokio::join!(client.stat("/a"), client.stat("/b"), client.stat("/c")) };
    let server = async {
        let mut requests = Vec::new();
        for _ in 0..3 {
            requests.push(next_request(&kernel).await);
        }
        let mut ids: Vec<u64> = requests.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);

        // Answer the third call first, then the first, then the second
        requests.sort_by_key(|r| r.id);
        for idx in [2usize, 0, 1] {
            let request = &requests[idx];
            let path = match &request.op {
                SyscallOp::Stat { path } => path.trim_start_matches('/').to_string(),
                other => panic!("unexpected op {:?}", other),
            };
            assert!(client.complete(stat_reply(request.id, FileInfo::new(path, 0o644, request.id))));
        }
    };

    let ((a, b, c), ()) = tokio::join!(calls, server);
    assert_eq!(a.unwrap().name, "a");
    assert_eq!(b.unwrap().name, "b");
    assert_eq!(c.unwrap().name, "c");
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn test_unknown_reply_id_is_dropped() {
    let (kernel, client) = client_pair(WireFormat::Bincode);

    let server = async {
        let request = next_request(&kernel).await;
        assert!(!client.complete(SyscallReply::success(request.id + 100, 0)));
        assert_eq!(client.pending_count(), 1);

        assert!(client.complete(SyscallReply::success(request.id, 1).with_data(b"/".to_vec())));
        // Already consumed
        assert!(!client.complete(SyscallReply::success(request.id, 1)));
    };

    let (cwd, ()) = tokio::join!(client.getwd(), server);
    assert_eq!(cwd.unwrap(), "/");
}

#[tokio::test]
async fn test_write_returns_reply_code() {
    let (kernel, client) = client_pair(WireFormat::Bincode);

    let server = async {
        let request = next_request(&kernel).await;
        assert_eq!(
            request.op,
            SyscallOp::Write {
                fd: 1,
                data: vec![72, 105],
                offset: 0,
                length: 2,
            }
        );
        client.complete(SyscallReply::success(request.id, 2));
    };

    let (written, ()) = tokio::join!(client.write(1, &[72, 105], 0, 2), server);
    assert_eq!(written, Ok(2));
}

#[tokio::test]
async fn test_read_copies_reply_data() {
    let (kernel, client) = client_pair(WireFormat::Json);
    let mut buf = [0u8; 4];

    let server = async {
        let request = next_request(&kernel).await;
        assert_eq!(request.op, SyscallOp::Read { fd: 3, length: 4 });
        client.complete(SyscallReply::success(request.id, 4).with_data(vec![1, 2, 3, 4]));
    };

    let (read, ()) = tokio::join!(client.read(3, &mut buf, 0, 4), server);
    assert_eq!(read, Ok(4));
    assert_eq!(buf, [1, 2, 3, 4]);
}

#[tokio::test]
async fn test_read_never_writes_past_requested_range() {
    let (kernel, client) = client_pair(WireFormat::Bincode);
    let mut buf = [0u8; 6];

    let server = async {
        let request = next_request(&kernel).await;
        client.complete(SyscallReply::success(request.id, 5).with_data(vec![9; 5]));
    };

    let (read, ()) = tokio::join!(client.read(3, &mut buf, 2, 3), server);
    assert_eq!(read, Ok(3));
    assert_eq!(buf, [0, 0, 9, 9, 9, 0]);
}

#[tokio::test]
async fn test_read_count_without_data_is_protocol_error() {
    let (kernel, client) = client_pair(WireFormat::Bincode);
    let mut buf = [0u8; 4];

    let server = async {
        let request = next_request(&kernel).await;
        client.complete(SyscallReply::success(request.id, 4));
    };

    let (read, ()) = tokio::join!(client.read(3, &mut buf, 0, 4), server);
    assert!(matches!(read, Err(SyscallError::Protocol(_))));
    assert_eq!(buf, [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_read_count_disagreeing_with_data_is_protocol_error() {
    let (kernel, client) = client_pair(WireFormat::Json);
    let mut buf = [0u8; 4];

    let server = async {
        let request = next_request(&kernel).await;
        client.complete(SyscallReply::success(request.id, 4).with_data(vec![1, 2]));
    };

    let (read, ()) = tokio::join!(client.read(3, &mut buf, 0, 4), server);
    assert!(matches!(read, Err(SyscallError::Protocol(_))));
    assert_eq!(buf, [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_read_end_of_file() {
    let (kernel, client) = client_pair(WireFormat::Bincode);
    let mut buf = [7u8; 2];

    let server = async {
        let request = next_request(&kernel).await;
        client.complete(SyscallReply::success(request.id, 0));
    };

    let (read, ()) = tokio::join!(client.read(3, &mut buf, 0, 2), server);
    assert_eq!(read, Ok(0));
    assert_eq!(buf, [7, 7]);
}

#[tokio::test]
async fn test_stat_failure_carries_message() {
    let (kernel, client) = client_pair(WireFormat::Bincode);

    let server = async {
        let request = next_request(&kernel).await;
        assert_eq!(
            request.op,
            SyscallOp::Stat {
                path: "/missing".into()
            }
        );
        client.complete(SyscallReply::failure(request.id, ReplyError::new("not found")));
    };

    let (stat, ()) = tokio::join!(client.stat("/missing"), server);
    let err = stat.unwrap_err();
    assert_eq!(err.remote_message(), Some("not found"));
    assert_eq!(err.errno(), None);
}

#[tokio::test]
async fn test_errno_is_relayed() {
    let (kernel, client) = client_pair(WireFormat::Json);

    let server = async {
        let request = next_request(&kernel).await;
        client.complete(SyscallReply::failure(
            request.id,
            ReplyError::from_errno(Errno::Ebadf),
        ));
    };

    let (closed, ()) = tokio::join!(client.close(9), server);
    assert_eq!(closed.unwrap_err().errno(), Some(Errno::Ebadf));
}

#[tokio::test]
async fn test_fstat_mode_decides_kind() {
    let (kernel, client) = client_pair(WireFormat::Bincode);

    let server = async {
        let first = next_request(&kernel).await;
        client.complete(stat_reply(first.id, FileInfo::from_mode(0x8000_0000)));
        let second = next_request(&kernel).await;
        client.complete(stat_reply(second.id, FileInfo::from_mode(0)));
    };
    let calls = async {
        let dir = client.fstat(3).await.unwrap();
        let file = client.fstat(4).await.unwrap();
        (dir, file)
    };

    let ((dir, file), ()) = tokio::join!(calls, server);
    assert!(dir.is_dir());
    assert!(!dir.is_file());
    assert!(file.is_file());
    assert!(!file.is_dir());
}

#[tokio::test]
async fn test_stat_without_object_is_protocol_error() {
    let (kernel, client) = client_pair(WireFormat::Bincode);

    let server = async {
        let request = next_request(&kernel).await;
        client.complete(SyscallReply::success(request.id, 0));
    };

    let (stat, ()) = tokio::join!(client.stat("/x"), server);
    assert!(matches!(stat, Err(SyscallError::Protocol(_))));
}

#[tokio::test]
async fn test_fail_all_wakes_outstanding_calls() {
    let (kernel, client) = client_pair(WireFormat::Bincode);

    let server = async {
        let _ = next_request(&kernel).await;
        assert_eq!(client.fail_all(SyscallError::ProcessTerminated), 1);
    };

    let (cwd, ()) = tokio::join!(client.getwd(), server);
    assert_eq!(cwd, Err(SyscallError::ProcessTerminated));
}

#[tokio::test]
async fn test_clients_sharing_a_generator_never_reuse_ids() {
    let (kernel, process) = channel(WireFormat::Bincode);
    let ids = CallIdGenerator::default_start();
    let first = SyscallClient::new(1, ids.clone(), process.sender(), ClientConfig::default());
    let second = SyscallClient::new(1, ids, process.sender(), ClientConfig::default());

    let server = async {
        let old = next_request(&kernel).await;
        first.fail_all(SyscallError::ProcessTerminated);

        let new = next_request(&kernel).await;
        assert!(new.id > old.id);
        // A late reply for the first client's call matches nothing in the second
        assert!(!second.complete(SyscallReply::success(old.id, 0)));
        assert!(second.complete(SyscallReply::success(new.id, 1).with_data(b"/".to_vec())));
    };
    let calls = async {
        let _ = first.getwd().await;
        second.getwd().await
    };

    let (cwd, ()) = tokio::join!(calls, server);
    assert_eq!(cwd.unwrap(), "/");
}
