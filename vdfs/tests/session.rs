use std::sync::Arc;

use block_dev::RamDisk;
use vdfs::{
    AccessState, Error, FileSystem, Geometry, Permission, Session, User, BLOCK_SIZE, GID_GUEST,
    GID_USERS,
};

const GEOMETRY: Geometry = Geometry {
    total_blocks: 1024,
    inode_count: 128,
};

fn disk() -> Arc<RamDisk> {
    Arc::new(RamDisk::new(BLOCK_SIZE, GEOMETRY.total_blocks as usize))
}

fn fresh() -> (FileSystem, Session) {
    let fs = FileSystem::format(disk(), GEOMETRY).unwrap();
    let session = Session::new(&fs, User::ROOT);
    (fs, session)
}

#[test]
fn owner_only_file_denies_everyone_else() {
    let (mut fs, mut session) = fresh();
    let alice = User::new(100, GID_USERS);
    let bob = User::new(101, GID_USERS);
    let guest = User::new(200, GID_GUEST);

    fs.make_dir(&session, "home", Some(Permission::from_mode(0o777))).unwrap();
    fs.change_dir(&mut session, "home").unwrap();
    session.switch_user(alice);
    fs.touch(&session, "secret", Some(Permission::from_mode(0o600))).unwrap();
    fs.write_file(&session, "secret", b"mine").unwrap();

    session.switch_user(bob);
    assert!(matches!(
        fs.write_file(&session, "secret", b"theirs"),
        Err(Error::PermissionDenied)
    ));
    assert!(matches!(
        fs.read_file(&session, "secret"),
        Err(Error::PermissionDenied)
    ));

    session.switch_user(guest);
    assert!(matches!(
        fs.read_file(&session, "secret"),
        Err(Error::PermissionDenied)
    ));

    session.switch_user(User::ROOT);
    assert_eq!(fs.read_file(&session, "secret").unwrap(), b"mine");
}

#[test]
fn new_nodes_belong_to_the_creator() {
    let (mut fs, mut session) = fresh();
    fs.make_dir(&session, "pub", Some(Permission::from_mode(0o777)))
        .unwrap();
    session.switch_user(User::new(7, GID_USERS));

    let id = fs.touch(&session, "/pub/note", None).unwrap();
    let inode = fs.read_inode(id).unwrap();
    assert_eq!((inode.owner, inode.group), (7, GID_USERS));
    assert_eq!(inode.perm, Permission::from_mode(0o644));

    assert!(matches!(
        fs.touch(&session, "/forbidden", None),
        Err(Error::PermissionDenied)
    ));
}

#[test]
fn locks_exclude_writers_and_readers() {
    let (mut fs, session) = fresh();
    let id = fs.touch(&session, "f", None).unwrap();

    fs.acquire_read(id).unwrap();
    fs.acquire_read(id).unwrap();
    assert_eq!(fs.access_state(id).unwrap(), AccessState::Reading(2));
    assert!(matches!(fs.acquire_write(id), Err(Error::ResourceBusy)));
    assert!(matches!(
        fs.write_file(&session, "f", b"x"),
        Err(Error::ResourceBusy)
    ));
    // 读锁之间不冲突
    assert_eq!(fs.read_file(&session, "f").unwrap(), b"");

    fs.release_read(id).unwrap();
    fs.release_read(id).unwrap();
    assert_eq!(fs.access_state(id).unwrap(), AccessState::Idle);

    fs.acquire_write(id).unwrap();
    assert!(matches!(fs.acquire_read(id), Err(Error::ResourceBusy)));
    assert!(matches!(fs.acquire_write(id), Err(Error::ResourceBusy)));
    assert!(matches!(fs.remove(&session, "f"), Err(Error::ResourceBusy)));
    fs.release_write(id).unwrap();

    fs.acquire_read(id).unwrap();
    fs.release_read(id).unwrap();
    fs.acquire_write(id).unwrap();
    fs.release_write(id).unwrap();
    assert_eq!(fs.access_state(id).unwrap(), AccessState::Idle);
}

#[test]
fn content_operations_leave_the_lock_idle() {
    let (mut fs, session) = fresh();
    let id = fs.touch(&session, "f", None).unwrap();

    fs.write_file(&session, "f", b"payload").unwrap();
    assert_eq!(fs.access_state(id).unwrap(), AccessState::Idle);
    assert_eq!(fs.read_file(&session, "f").unwrap(), b"payload");
    assert_eq!(fs.access_state(id).unwrap(), AccessState::Idle);

    // 失败的写入同样释放锁
    let huge = vec![0u8; vdfs::MAX_FILE_BLOCKS * BLOCK_SIZE + 1];
    assert!(fs.write_file(&session, "f", &huge).is_err());
    assert_eq!(fs.access_state(id).unwrap(), AccessState::Idle);
}

#[test]
fn remove_rules() {
    let (mut fs, mut session) = fresh();
    fs.make_dir(&session, "d", None).unwrap();
    fs.touch(&session, "d/f", None).unwrap();

    assert!(matches!(fs.remove(&session, "d"), Err(Error::NotEmpty)));
    assert!(matches!(fs.remove(&session, "d/.."), Err(Error::InvalidName)));
    assert!(matches!(fs.remove(&session, "nothing"), Err(Error::NotFound)));

    session.switch_user(User::new(300, GID_GUEST));
    assert!(matches!(
        fs.remove(&session, "d/f"),
        Err(Error::PermissionDenied)
    ));
    session.switch_user(User::ROOT);

    fs.change_dir(&mut session, "d").unwrap();
    fs.remove(&session, "f").unwrap();
    assert!(matches!(fs.remove(&session, "../d"), Err(Error::ResourceBusy)));

    fs.change_dir(&mut session, "..").unwrap();
    let free = fs.stat_fs();
    fs.remove(&session, "d").unwrap();
    assert!(fs.list(&session).unwrap().is_empty());
    assert_eq!(fs.stat_fs().free_inodes, free.free_inodes + 1);
    assert_eq!(fs.stat_fs().free_blocks, free.free_blocks + 1);
}

#[test]
fn change_dir_tracks_display_path() {
    let (mut fs, mut session) = fresh();
    fs.make_dir(&session, "a", None).unwrap();
    fs.make_dir(&session, "a/b", None).unwrap();
    fs.touch(&session, "a/file", None).unwrap();

    fs.change_dir(&mut session, "a/b").unwrap();
    assert_eq!(session.cwd_path(), "/a/b");
    fs.change_dir(&mut session, "../..").unwrap();
    assert_eq!(session.cwd_path(), "/");
    assert_eq!(session.cwd(), fs.root());
    fs.change_dir(&mut session, "..").unwrap();
    assert_eq!(session.cwd_path(), "/");

    assert!(matches!(
        fs.change_dir(&mut session, "a/file"),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        fs.change_dir(&mut session, "missing"),
        Err(Error::NotFound)
    ));

    fs.make_dir(&session, "closed", Some(Permission::from_mode(0o700)))
        .unwrap();
    session.switch_user(User::new(5, GID_USERS));
    assert!(matches!(
        fs.change_dir(&mut session, "closed"),
        Err(Error::PermissionDenied)
    ));
    assert_eq!(session.cwd_path(), "/");
}

#[test]
fn listing_skips_dot_entries_in_storage_order() {
    let (mut fs, session) = fresh();
    for name in ["one", "two", "three"] {
        fs.touch(&session, name, None).unwrap();
    }
    fs.make_dir(&session, "four", None).unwrap();

    let names: Vec<_> = fs
        .list(&session)
        .unwrap()
        .into_iter()
        .map(|listing| listing.name)
        .collect();
    assert_eq!(names, ["one", "two", "three", "four"]);
}

#[test]
fn everything_survives_reopening() {
    let device = disk();
    let (file_id, stat) = {
        let mut fs = FileSystem::format(device.clone(), GEOMETRY).unwrap();
        let mut session = Session::new(&fs, User::ROOT);
        fs.make_dir(&session, "docs", None).unwrap();
        fs.change_dir(&mut session, "docs").unwrap();
        let id = fs.touch(&session, "readme", None).unwrap();
        fs.write_file(&session, "readme", &[b'z'; 3000]).unwrap();
        fs.sync().unwrap();
        (id, fs.stat_fs())
    };

    let fs = FileSystem::open(device).unwrap();
    assert_eq!(fs.stat_fs(), stat);
    assert_eq!(fs.resolve(fs.root(), "/docs/readme").unwrap(), file_id);
    assert_eq!(fs.read(file_id, usize::MAX).unwrap(), vec![b'z'; 3000]);
    assert_eq!(
        fs.stat_fs().free_blocks,
        fs.stat_fs().data_blocks - fs.allocated_blocks()
    );
}
