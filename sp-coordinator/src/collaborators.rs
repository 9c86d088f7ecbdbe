use sp_base::Error;
use sp_superblock::Superblock;

/// `SettlementPublisher.Publish(superblock, proof?) -> txRef` and
/// `Watch(txRef) -> receipt` (§6). An adapter boundary the core depends on
/// but never implements for a real L1.
pub trait SettlementPublisher: Send + Sync {
    fn publish(&self, superblock: &Superblock, proof: Option<&[u8]>) -> Result<String, Error>;
    fn watch(&self, tx_ref: &str) -> Result<(), Error>;
}

/// `ProofService.Submit(superblock, aggregationInputs) -> jobId`,
/// `Status(jobId)`, `Deliver(jobId) -> proofBytes` (§6).
pub trait ProofService: Send + Sync {
    fn submit(&self, superblock: &Superblock) -> Result<String, Error>;
    fn status(&self, job_id: &str) -> Result<String, Error>;
    fn deliver(&self, job_id: &str) -> Result<Vec<u8>, Error>;
}

/// A logging-only `SettlementPublisher` so the binary runs end-to-end in a
/// single-process demo without real L1 infrastructure.
pub struct LoggingSettlementPublisher;

impl SettlementPublisher for LoggingSettlementPublisher {
    fn publish(&self, superblock: &Superblock, proof: Option<&[u8]>) -> Result<String, Error> {
        let tx_ref = format!("demo-tx-{}", superblock.number);
        tracing::info!(number = superblock.number, has_proof = proof.is_some(), %tx_ref, "settlement publish (stub)");
        Ok(tx_ref)
    }

    fn watch(&self, tx_ref: &str) -> Result<(), Error> {
        tracing::info!(%tx_ref, "settlement watch (stub): reporting immediate receipt");
        Ok(())
    }
}

/// A logging-only `ProofService`: jobs "complete" immediately with an
/// empty proof, since no real prover is wired into this demo.
pub struct LoggingProofService;

impl ProofService for LoggingProofService {
    fn submit(&self, superblock: &Superblock) -> Result<String, Error> {
        let job_id = format!("demo-job-{}", superblock.number);
        tracing::info!(number = superblock.number, %job_id, "proof submit (stub)");
        Ok(job_id)
    }

    fn status(&self, job_id: &str) -> Result<String, Error> {
        Ok(format!("{job_id}:complete"))
    }

    fn deliver(&self, job_id: &str) -> Result<Vec<u8>, Error> {
        tracing::info!(%job_id, "proof deliver (stub): empty proof");
        Ok(Vec::new())
    }
}
