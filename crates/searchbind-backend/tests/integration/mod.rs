mod differential;
mod workflow;
