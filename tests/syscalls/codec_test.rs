/*!
 * Wire Codec Tests
 * Every frame survives an encode/decode cycle in both wire formats
 */

use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

use relay_kernel::ipc::{ToKernel, ToProcess, WireFormat};
use relay_kernel::syscalls::types::{
    DirEntry, Errno, FileInfo, IoctlRequest, ReplyError, ReplyObject, SyscallOp, SyscallReply,
    SyscallRequest,
};

fn path() -> impl Strategy<Value = String> {
    "(/[a-z0-9._-]{1,8}){0,4}|[a-z]{1,8}|/"
}

fn ioctl() -> impl Strategy<Value = IoctlRequest> {
    prop_oneof![
        Just(IoctlRequest::GetFlags),
        any::<u32>().prop_map(IoctlRequest::SetFlags),
        "[A-Z]{3,10}".prop_map(IoctlRequest::Other),
    ]
}

fn op() -> impl Strategy<Value = SyscallOp> {
    prop_oneof![
        (path(), any::<u32>(), any::<u32>())
            .prop_map(|(path, flags, mode)| SyscallOp::Open { path, flags, mode }),
        (any::<u32>(), vec(any::<u8>(), 0..256), any::<u64>(), any::<u64>()).prop_map(
            |(fd, data, offset, length)| SyscallOp::Write {
                fd,
                data,
                offset,
                length
            }
        ),
        (any::<u32>(), any::<u64>()).prop_map(|(fd, length)| SyscallOp::Read { fd, length }),
        path().prop_map(|path| SyscallOp::Stat { path }),
        any::<u32>().prop_map(|fd| SyscallOp::Fstat { fd }),
        path().prop_map(|path| SyscallOp::Readdir { path }),
        any::<u32>().prop_map(|fd| SyscallOp::Close { fd }),
        Just(SyscallOp::Getwd),
        path().prop_map(|path| SyscallOp::Chdir { path }),
        (any::<u32>(), ioctl()).prop_map(|(fd, request)| SyscallOp::Ioctl { fd, request }),
    ]
}

fn request() -> impl Strategy<Value = SyscallRequest> {
    (any::<u64>(), op()).prop_map(|(id, op)| SyscallRequest::new(id, op))
}

fn errno() -> impl Strategy<Value = Errno> {
    prop_oneof![
        Just(Errno::Enoent),
        Just(Errno::Einval),
        Just(Errno::Enosys),
        Just(Errno::Ebadf),
        Just(Errno::Eexist),
        Just(Errno::Eisdir),
        Just(Errno::Enotdir),
        Just(Errno::Eacces),
        Just(Errno::Eio),
        Just(Errno::Emfile),
    ]
}

fn object() -> impl Strategy<Value = ReplyObject> {
    prop_oneof![
        ("[a-z]{0,8}", any::<u32>(), any::<u64>(), any::<u64>()).prop_map(
            |(name, mode, size, modified)| {
                ReplyObject::FileInfo(FileInfo::new(name, mode, size).with_modified(modified))
            }
        ),
        vec(("[a-z]{1,8}", any::<u32>()), 0..8).prop_map(|entries| {
            ReplyObject::Entries(
                entries
                    .into_iter()
                    .map(|(name, mode)| DirEntry::new(name, mode))
                    .collect(),
            )
        }),
    ]
}

fn reply() -> impl Strategy<Value = SyscallReply> {
    (
        any::<u64>(),
        option::of((option::of(errno()), ".{0,24}")),
        any::<i64>(),
        option::of(vec(any::<u8>(), 0..128)),
        option::of(object()),
    )
        .prop_map(|(id, error, code, data, object)| SyscallReply {
            id,
            error: error.map(|(errno, message)| ReplyError { errno, message }),
            code,
            data,
            object,
        })
}

const FORMATS: [WireFormat; 2] = [WireFormat::Bincode, WireFormat::Json];

proptest! {
    #[test]
    fn request_round_trips(req in request()) {
        for format in FORMATS {
            let bytes = format.encode(&req).unwrap();
            let back: SyscallRequest = format.decode(&bytes).unwrap();
            prop_assert_eq!(&back, &req);
        }
    }

    #[test]
    fn request_frame_round_trips(req in request()) {
        let frame = ToKernel::Syscall(req);
        for format in FORMATS {
            let bytes = format.encode(&frame).unwrap();
            let back: ToKernel = format.decode(&bytes).unwrap();
            prop_assert_eq!(&back, &frame);
        }
    }

    #[test]
    fn reply_frame_round_trips(reply in reply()) {
        let frame = ToProcess::Reply(reply);
        for format in FORMATS {
            let bytes = format.encode(&frame).unwrap();
            let back: ToProcess = format.decode(&bytes).unwrap();
            prop_assert_eq!(&back, &frame);
        }
    }
}

#[test]
fn test_mismatched_format_is_an_error() {
    let req = SyscallRequest::new(1, SyscallOp::Getwd);
    let bytes = WireFormat::Bincode.encode(&req).unwrap();
    assert!(WireFormat::Json.decode::<SyscallRequest>(&bytes).is_err());
}

#[test]
fn test_json_request_shape() {
    let req = SyscallRequest::new(
        5,
        SyscallOp::Stat {
            path: "/tmp".into(),
        },
    );
    let value: serde_json::Value = serde_json::from_slice(&WireFormat::Json.encode(&req).unwrap()).unwrap();
    assert_eq!(value["id"], 5);
    assert_eq!(value["op"]["stat"]["path"], "/tmp");
}
