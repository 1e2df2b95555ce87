
    use super::*;
    use tempfile::TempDir;

    fn temp_lock() -> (TempDir, ProcessLock) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dakoku.pid");
        (dir, ProcessLock::new(path))
    }

    /// Spawn and reap a short-lived child so its pid is known to be dead.
    #[cfg(unix)]
    fn dead_pid() -> u32 {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    #[test]
    fn test_lock_new() {
        let lock = ProcessLock::new("/tmp/dakoku-test.pid");
        assert_eq!(lock.path(), Path::new("/tmp/dakoku-test.pid"));
        assert!(!lock.is_owned());
    }

    #[test]
    fn test_read_pid_missing_file() {
        let (_dir, lock) = temp_lock();
        assert!(!lock.exists());
        assert!(lock.read_pid().unwrap().is_none());
    }

    #[test]
    fn test_read_pid_malformed_file() {
        let (_dir, lock) = temp_lock();
        fs::write(lock.path(), "not-a-pid").unwrap();
        assert!(lock.read_pid().unwrap().is_none());
    }

    #[test]
    fn test_write_and_read_pid() {
        let (_dir, mut lock) = temp_lock();
        lock.write_pid_value(12345).unwrap();

        assert!(lock.exists());
        assert_eq!(lock.read_pid().unwrap(), Some(12345));
        assert!(lock.is_owned());
    }

    #[tokio::test]
    async fn test_acquire_fresh() {
        let (_dir, mut lock) = temp_lock();
        let acquisition = lock.acquire().await.unwrap();

        assert_eq!(acquisition, LockAcquisition::Fresh);
        assert_eq!(lock.read_pid().unwrap(), Some(std::process::id()));
        assert!(lock.is_owned());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_acquire_recovers_stale_lock() {
        let (_dir, mut lock) = temp_lock();
        let stale = dead_pid();
        fs::write(lock.path(), stale.to_string()).unwrap();

        let acquisition = lock.acquire().await.unwrap();

        assert_eq!(acquisition, LockAcquisition::RecoveredStale { pid: stale });
        assert_eq!(lock.read_pid().unwrap(), Some(std::process::id()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_acquire_terminates_live_previous_run() {
        let (_dir, lock) = temp_lock();
        let mut lock = lock.with_grace_period(Duration::from_millis(300));

        let mut previous = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let previous_pid = previous.id();
        fs::write(lock.path(), previous_pid.to_string()).unwrap();

        let acquisition = lock.acquire().await.unwrap();

        assert_eq!(
            acquisition,
            LockAcquisition::TerminatedPrevious { pid: previous_pid }
        );
        assert_eq!(lock.read_pid().unwrap(), Some(std::process::id()));

        let status = previous.wait().unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_acquire_own_pid_is_fresh() {
        let (_dir, mut lock) = temp_lock();
        fs::write(lock.path(), std::process::id().to_string()).unwrap();

        assert_eq!(lock.acquire().await.unwrap(), LockAcquisition::Fresh);
    }

    #[test]
    fn test_release_removes_owned_lock() {
        let (_dir, mut lock) = temp_lock();
        lock.write_pid_value(std::process::id()).unwrap();

        lock.release().unwrap();
        assert!(!lock.exists());
        assert!(!lock.is_owned());
    }

    #[test]
    fn test_release_is_idempotent() {
        let (_dir, mut lock) = temp_lock();
        lock.write_pid_value(std::process::id()).unwrap();

        lock.release().unwrap();
        assert!(lock.release().is_ok());
    }

    #[test]
    fn test_release_leaves_lock_taken_over_by_another_run() {
        let (_dir, mut lock) = temp_lock();
        lock.write_pid_value(std::process::id()).unwrap();
        fs::write(lock.path(), "424242").unwrap();

        lock.release().unwrap();
        assert!(lock.exists());
    }

    #[test]
    fn test_release_without_ownership_keeps_file() {
        let (_dir, lock) = temp_lock();
        fs::write(lock.path(), "12345").unwrap();

        let mut other = ProcessLock::new(lock.path());
        other.release().unwrap();
        assert!(other.exists());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp").join("nested").join("dakoku.pid");
        let mut lock = ProcessLock::new(path.clone());

        lock.write_pid_value(std::process::id()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_is_process_running_current() {
        assert!(is_process_running(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_is_process_running_dead() {
        assert!(!is_process_running(dead_pid()));
    }

    #[test]
    fn test_drop_removes_owned_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dakoku.pid");

        {
            let mut lock = ProcessLock::new(path.clone());
            lock.write_pid_value(std::process::id()).unwrap();
            assert!(path.exists());
        }

        assert!(!path.exists());
    }
