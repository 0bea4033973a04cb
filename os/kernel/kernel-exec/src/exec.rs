use crate::elf::{ELF_HEADER_SIZE, ElfHeader, PROGRAM_HEADER_SIZE, ProgramHeader};
use crate::stack::write_initial_stack;
use crate::{ExecError, FileSystem, FsError, Inode, ProcName, Process, UserMemory};
use core::mem::ManuallyDrop;
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, page_round_up};
use kernel_vmem::VmError;

/// The binary being loaded, open inside a filesystem transaction.
///
/// Dropping it releases the inode and ends the transaction.
struct OpenImage<'a, F: FileSystem> {
    fs: &'a F,
    inode: F::Inode,
}

impl<'a, F: FileSystem> OpenImage<'a, F> {
    fn open(fs: &'a F, path: &str) -> Result<Self, ExecError> {
        fs.begin_op();
        match fs.open(path) {
            Some(inode) => Ok(Self { fs, inode }),
            None => {
                fs.end_op();
                Err(ExecError::NotFound)
            }
        }
    }

    fn header(&self) -> Result<ElfHeader, ExecError> {
        let mut buf = [0u8; ELF_HEADER_SIZE];
        self.inode.read_exact_at(0, &mut buf).map_err(|e| match e {
            FsError::ShortRead { .. } => ExecError::ShortHeader,
            e => e.into(),
        })?;
        Ok(ElfHeader::parse(&buf))
    }

    fn program_header(&self, elf: &ElfHeader, index: u16) -> Result<ProgramHeader, ExecError> {
        let offset = elf
            .program_header_offset(index)
            .ok_or(ExecError::ShortSegment(index))?;
        let mut buf = [0u8; PROGRAM_HEADER_SIZE];
        self.inode.read_exact_at(offset, &mut buf).map_err(|e| match e {
            FsError::ShortRead { .. } => ExecError::ShortSegment(index),
            e => e.into(),
        })?;
        Ok(ProgramHeader::parse(&buf))
    }
}

impl<F: FileSystem> Drop for OpenImage<'_, F> {
    fn drop(&mut self) {
        self.fs.release(&self.inode);
        self.fs.end_op();
    }
}

/// An address space under construction.
///
/// Destroyed on drop unless [`commit`](Self::commit) hands it out.
struct PendingSpace<'a, V: UserMemory + ?Sized> {
    vm: &'a V,
    space: ManuallyDrop<V::Space>,
}

impl<'a, V: UserMemory + ?Sized> PendingSpace<'a, V> {
    fn new(vm: &'a V) -> Result<Self, ExecError> {
        Ok(Self {
            vm,
            space: ManuallyDrop::new(vm.new_space()?),
        })
    }

    fn space(&self) -> &V::Space {
        &self.space
    }

    /// Disarm and take the space.
    fn commit(self) -> V::Space {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the space is taken exactly once.
        unsafe { ManuallyDrop::take(&mut this.space) }
    }
}

impl<V: UserMemory + ?Sized> Drop for PendingSpace<'_, V> {
    fn drop(&mut self) {
        // SAFETY: drop runs once and `commit` skips it.
        let space = unsafe { ManuallyDrop::take(&mut self.space) };
        self.vm.destroy(space);
    }
}

/// Replace the memory image of `proc` with the executable at `path`.
///
/// On success the process runs the new image from its entry point, with
/// `argv` on its stack, and its previous address space has been destroyed.
/// On failure nothing about `proc` has changed and everything acquired
/// during the attempt has been released.
///
/// # Errors
/// Any [`ExecError`]; see its variants.
pub fn load_image<F, V, A>(
    fs: &F,
    vm: &V,
    proc: &mut Process<V::Space>,
    path: &str,
    argv: &[A],
) -> Result<(), ExecError>
where
    F: FileSystem,
    V: UserMemory + ?Sized,
    A: AsRef<[u8]>,
{
    let result = try_load(fs, vm, proc, path, argv);
    if let Err(e) = &result {
        log::warn!("exec {path}: {e}");
    }
    result
}

fn try_load<F, V, A>(
    fs: &F,
    vm: &V,
    proc: &mut Process<V::Space>,
    path: &str,
    argv: &[A],
) -> Result<(), ExecError>
where
    F: FileSystem,
    V: UserMemory + ?Sized,
    A: AsRef<[u8]>,
{
    let file = OpenImage::open(fs, path)?;
    let elf = file.header()?;
    if !elf.has_valid_magic() {
        return Err(ExecError::BadMagic(elf.magic));
    }

    // Declared after `file`: dropped first, so a failure destroys the space
    // before the file is released.
    let pending = PendingSpace::new(vm)?;
    let space = pending.space();

    let mut size = 0;
    for i in 0..elf.phnum {
        let ph = file.program_header(&elf, i)?;
        if !ph.is_load() {
            continue;
        }
        let end = ph.validate()?;
        size = vm.grow(space, size, end)?;
        vm.load_segment(space, ph.vaddr, &file.inode, ph.offset, ph.filesz)?;
        log::debug!(
            "segment {i}: {} file {:#x} mem {:#x} flags {:?}",
            ph.vaddr,
            ph.filesz,
            ph.memsz,
            ph.flags
        );
    }
    drop(file);

    // Two pages at the next boundary: a guard, then the stack.
    let base = page_round_up(size).ok_or(VmError::Overflow)?;
    let top = base.checked_add(2 * PAGE_SIZE).ok_or(VmError::Overflow)?;
    let size = vm.grow(space, base, top)?;
    vm.clear_user(space, VirtualAddress::new(top - 2 * PAGE_SIZE));
    let sp = write_initial_stack(vm, space, top, argv)?;

    proc.name = ProcName::from_path(path);
    let old = core::mem::replace(&mut proc.space, pending.commit());
    proc.size = size;
    proc.tf.eip = elf.entry.as_u32();
    proc.tf.esp = sp;
    vm.activate(&proc.space);
    vm.destroy(old);

    log::info!(
        "exec {}: entry {:#010x} sp {sp:#010x} size {size:#x}",
        proc.name,
        proc.tf.eip
    );
    Ok(())
}
